//! Blue-noise placement of enemy groups.
//!
//! Group spawn points are produced per region with Bridson's Poisson-disk
//! sampling: no two points closer than the region's minimum distance, with
//! the irregular look of blue noise. The random source is always passed in,
//! so one seed reproduces the whole placement bit for bit.

use crate::components::{Bounds, CreatureType, Faction};
use crate::config::RegionConfig;
use crate::spatial::SpatialGrid;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::{SQRT_2, TAU};

/// Poisson-disk sampler for one rectangle.
#[derive(Debug, Clone, Copy)]
pub struct PoissonDiskSampler {
    pub bounds: Bounds,
    pub min_distance: f32,
    /// Candidates tried around an active point before it is retired.
    pub max_attempts: u32,
}

/// Output of one sampling run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoissonSample {
    pub points: Vec<(f32, f32)>,
    /// Candidates thrown away because they fell outside the bounds or too close.
    pub rejected_candidates: usize,
    /// Active points retired after exhausting their attempts.
    pub retired: usize,
}

impl PoissonDiskSampler {
    pub fn new(bounds: Bounds, min_distance: f32, max_attempts: u32) -> Self {
        Self { bounds, min_distance, max_attempts }
    }

    pub fn for_region(region: &RegionConfig) -> Self {
        Self::new(region.bounds, region.min_distance, region.max_attempts)
    }

    /// Run Bridson's algorithm. Callers validate the parameters first.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PoissonSample {
        let d = self.min_distance;
        let b = self.bounds;
        let mut result = PoissonSample::default();

        // Cell diagonal equals d, so each cell holds at most one accepted point.
        let mut accepted: SpatialGrid<usize> = SpatialGrid::new(d / SQRT_2);
        let mut active: Vec<usize> = Vec::new();

        let seed = (rng.gen_range(b.min_x..b.max_x), rng.gen_range(b.min_y..b.max_y));
        accepted.insert(0, seed.0, seed.1, Faction::Wild);
        result.points.push(seed);
        active.push(0);

        while !active.is_empty() {
            let slot = rng.gen_range(0..active.len());
            let (ox, oy) = result.points[active[slot]];

            let mut found = None;
            for _ in 0..self.max_attempts {
                let angle = rng.gen_range(0.0..TAU);
                let radius = rng.gen_range(d..2.0 * d);
                let (cx, cy) = (ox + radius * angle.cos(), oy + radius * angle.sin());

                if b.contains(cx, cy) && !accepted.any_closer_than(cx, cy, d) {
                    found = Some((cx, cy));
                    break;
                }
                result.rejected_candidates += 1;
            }

            match found {
                Some((cx, cy)) => {
                    let index = result.points.len();
                    accepted.insert(index, cx, cy, Faction::Wild);
                    result.points.push((cx, cy));
                    active.push(index);
                }
                None => {
                    active.swap_remove(slot);
                    result.retired += 1;
                }
            }
        }

        result
    }
}

/// One group to instantiate: creature type and member positions.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupPlan {
    pub region: u32,
    pub creature: CreatureType,
    /// Poisson-disk point the group was placed at; also the members' centroid.
    pub center: (f32, f32),
    pub members: Vec<(f32, f32)>,
}

/// Per-region spawn statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnReport {
    pub region: u32,
    pub groups: usize,
    pub members: usize,
    pub rejected_candidates: usize,
}

/// Plan every group of a region: sample spawn points, then draw a creature
/// type and member count for each and scatter the members around it.
pub fn plan_region_groups<R: Rng + ?Sized>(
    region: &RegionConfig,
    member_jitter: f32,
    rng: &mut R,
) -> (Vec<GroupPlan>, SpawnReport) {
    let sample = PoissonDiskSampler::for_region(region).sample(rng);
    log::debug!(
        "region {}: {} spawn points, {} candidates rejected, {} points retired",
        region.id,
        sample.points.len(),
        sample.rejected_candidates,
        sample.retired
    );

    let plans: Vec<GroupPlan> = sample
        .points
        .iter()
        .map(|&center| {
            let creature = region.allowed_types[rng.gen_range(0..region.allowed_types.len())];
            let count = rng.gen_range(region.group_size.min..=region.group_size.max) as usize;
            GroupPlan {
                region: region.id,
                creature,
                center,
                members: scatter_members(center, count, member_jitter, &region.bounds, rng),
            }
        })
        .collect();

    let report = SpawnReport {
        region: region.id,
        groups: plans.len(),
        members: plans.iter().map(|p| p.members.len()).sum(),
        rejected_candidates: sample.rejected_candidates,
    };
    (plans, report)
}

/// Scatter `count` points uniformly in a disk around `center`.
///
/// Offsets are re-centred so the points' centroid is exactly `center`, then
/// shrunk together if needed so every point stays inside `bounds`.
fn scatter_members<R: Rng + ?Sized>(
    center: (f32, f32),
    count: usize,
    jitter: f32,
    bounds: &Bounds,
    rng: &mut R,
) -> Vec<(f32, f32)> {
    let mut offsets: Vec<(f32, f32)> = (0..count)
        .map(|_| {
            let angle = rng.gen_range(0.0..TAU);
            let radius = jitter * rng.gen::<f32>().sqrt();
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect();

    let n = count.max(1) as f32;
    let mean_x = offsets.iter().map(|o| o.0).sum::<f32>() / n;
    let mean_y = offsets.iter().map(|o| o.1).sum::<f32>() / n;
    for offset in &mut offsets {
        offset.0 -= mean_x;
        offset.1 -= mean_y;
    }

    let scale = offsets
        .iter()
        .map(|&(ox, oy)| axis_room(center.0, ox, bounds.min_x, bounds.max_x).min(axis_room(center.1, oy, bounds.min_y, bounds.max_y)))
        .fold(1.0_f32, f32::min);

    offsets
        .into_iter()
        .map(|(ox, oy)| (center.0 + ox * scale, center.1 + oy * scale))
        .collect()
}

/// Largest `t` in [0, 1] keeping `c + t * o` within `[min, max]`.
fn axis_room(c: f32, o: f32, min: f32, max: f32) -> f32 {
    if o > 0.0 {
        ((max - c) / o).clamp(0.0, 1.0)
    } else if o < 0.0 {
        ((min - c) / o).clamp(0.0, 1.0)
    } else {
        1.0
    }
}
