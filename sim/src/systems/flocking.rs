//! Flocking: per-group boid steering and leader wandering.
//!
//! ## Steering model
//!
//! Every living group member blends four unit-length terms with per-creature
//! weights:
//! - **separation** away from members inside the separation radius
//! - **alignment** toward the other members' mean velocity
//! - **cohesion** toward the other members' centroid
//! - **seek** toward the group's anchor
//!
//! The anchor is the wander point for an idle leader, the leader for idle
//! followers, and the aggro target for everyone once the group is hostile.
//! The blended direction is scaled to the creature's speed and slowed
//! linearly inside the arrival radius.
//!
//! ## Three Phases
//!
//! 1. **Gather**: snapshot pre-tick member positions and velocities per group
//! 2. **Compute**: steer each group from its snapshot (pure)
//! 3. **Apply**: write velocities back
//!
//! No group ever reads a velocity written in the same tick.
//!
//! ## Parallel Feature
//!
//! When compiled with `--features parallel`, the compute phase uses rayon to
//! steer groups across threads. Results are collected in group order, so
//! both builds produce identical velocities.

use crate::components::*;
use crate::config::{CreatureProfile, CreatureTable, SimConfig};
use crate::groups::{AggroState, GroupRegistry};
use crate::spatial::SpatialGrid;
use crate::systems::aggro::resolve_target;
use crate::systems::movement::DeltaTime;
use crate::systems::tame::PlayerSession;
use bevy_ecs::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f32::consts::TAU;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Seeded random source for runtime decisions (wander points and intervals).
#[derive(Resource, Debug, Clone)]
pub struct SimRng(pub ChaCha8Rng);

// ============================================================================
// STEERING TERMS
// ============================================================================

/// One member's pre-tick kinematic state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boid {
    pub entity: Entity,
    pub position: Position,
    pub velocity: Velocity,
}

/// Sum of unit vectors pointing away from every neighbour within `radius`,
/// normalized. Coincident neighbours contribute nothing.
pub fn separation(me: &Boid, others: &[Boid], radius: f32) -> Velocity {
    let mut push = Velocity::ZERO;
    for other in others {
        if other.entity == me.entity {
            continue;
        }
        let d = me.position.distance_to(&other.position);
        if d > 0.0 && d < radius {
            push = push.plus(Velocity::new(me.position.x - other.position.x, me.position.y - other.position.y).scaled(1.0 / d));
        }
    }
    push.normalized()
}

/// Direction from own velocity toward the mean velocity of the others.
pub fn alignment(me: &Boid, others: &[Boid]) -> Velocity {
    let (sum, n) = others
        .iter()
        .filter(|o| o.entity != me.entity)
        .fold((Velocity::ZERO, 0usize), |(sum, n), o| (sum.plus(o.velocity), n + 1));
    if n == 0 {
        return Velocity::ZERO;
    }
    sum.scaled(1.0 / n as f32).minus(me.velocity).normalized()
}

/// Direction toward the centroid of the others.
pub fn cohesion(me: &Boid, others: &[Boid]) -> Velocity {
    let (sx, sy, n) = others
        .iter()
        .filter(|o| o.entity != me.entity)
        .fold((0.0, 0.0, 0usize), |(sx, sy, n), o| (sx + o.position.x, sy + o.position.y, n + 1));
    if n == 0 {
        return Velocity::ZERO;
    }
    me.position.direction_to(&Position::new(sx / n as f32, sy / n as f32))
}

/// Scale a blended steering direction to final velocity.
///
/// Slows linearly to a stop inside `arrival_radius` of `anchor`.
pub fn finalize(steering: Velocity, position: &Position, anchor: Option<Position>, profile: &CreatureProfile) -> Velocity {
    let arrival = anchor
        .map(|a| (position.distance_to(&a) / profile.arrival_radius).min(1.0))
        .unwrap_or(1.0);
    steering.normalized().scaled(profile.move_speed * arrival)
}

/// Everything needed to steer one group.
#[derive(Debug, Clone)]
pub struct GroupSteering {
    pub state: AggroState,
    pub leader: Entity,
    /// Wander point while Idle, target position while Aggro.
    pub goal: Option<Position>,
    pub members: Vec<Boid>,
    pub profile: CreatureProfile,
}

/// Compute the new velocity of every member of a group.
pub fn steer_group(group: &GroupSteering) -> Vec<(Entity, Velocity)> {
    let p = &group.profile;
    let leader_pos = group
        .members
        .iter()
        .find(|b| b.entity == group.leader)
        .map(|b| b.position);

    group
        .members
        .iter()
        .map(|me| {
            let idle_leader = group.state == AggroState::Idle && me.entity == group.leader;
            let anchor = match group.state {
                AggroState::Idle if idle_leader => group.goal,
                AggroState::Idle => leader_pos,
                AggroState::Aggro => group.goal,
            };

            let mut steering = separation(me, &group.members, p.separation_radius).scaled(p.separation_weight);
            if !idle_leader {
                steering = steering
                    .plus(alignment(me, &group.members).scaled(p.alignment_weight))
                    .plus(cohesion(me, &group.members).scaled(p.cohesion_weight));
            }
            if let Some(anchor) = anchor {
                steering = steering.plus(me.position.direction_to(&anchor).scaled(p.seek_weight));
            }

            (me.entity, finalize(steering, &me.position, anchor, p))
        })
        .collect()
}

// ============================================================================
// WANDER SYSTEM
// ============================================================================

/// System that moves the wander point of every idle group's leader.
///
/// A new point is drawn when the interval runs out, or early when the leader
/// has reached its region edge while the point lies beyond it.
pub fn wander_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    mut rng: ResMut<SimRng>,
    mut registry: ResMut<GroupRegistry>,
    leaders: Query<(&Position, Option<&HomeRegion>)>,
) {
    let delta = dt.0;
    let rng = &mut rng.0;

    for group in registry.iter_mut() {
        if group.state != AggroState::Idle {
            continue;
        }
        let Ok((pos, home)) = leaders.get(group.leader) else {
            continue;
        };

        group.wander_timer -= delta;
        let blocked = match (home, group.wander_target) {
            (Some(home), Some((tx, ty))) => {
                home.bounds.edge_distance(pos.x, pos.y) <= config.boundary_margin && !home.bounds.contains(tx, ty)
            }
            _ => false,
        };

        if group.wander_timer <= 0.0 || group.wander_target.is_none() || blocked {
            let heading = rng.gen_range(0.0..TAU);
            let distance = rng.gen_range(config.wander_distance_min..=config.wander_distance_max);
            group.wander_target = Some((pos.x + distance * heading.cos(), pos.y + distance * heading.sin()));
            group.wander_timer = rng.gen_range(config.wander_interval_min..=config.wander_interval_max);
        }
    }
}

// ============================================================================
// FLOCKING SYSTEM
// ============================================================================

/// System that sets the velocity of every living group member.
///
/// ## Data Access
/// - Reads: CreatureTable, PlayerSession, GroupRegistry, minion positions
/// - Writes: Velocity
pub fn flocking_system(
    creatures: Res<CreatureTable>,
    session: Res<PlayerSession>,
    registry: Res<GroupRegistry>,
    mut bodies: Query<(&Position, &mut Velocity, &Lifecycle), Without<Minion>>,
    minions: Query<(&Position, &Lifecycle), With<Minion>>,
) {
    // GATHER PHASE
    let groups: Vec<GroupSteering> = registry
        .iter()
        .map(|group| {
            let members = group
                .members
                .iter()
                .filter_map(|&entity| match bodies.get(entity) {
                    Ok((position, velocity, lifecycle)) if lifecycle.is_alive() => Some(Boid {
                        entity,
                        position: *position,
                        velocity: *velocity,
                    }),
                    _ => None,
                })
                .collect();
            let goal = match group.state {
                AggroState::Idle => group.wander_target.map(Position::from),
                AggroState::Aggro => group
                    .target
                    .and_then(|t| resolve_target(t, session.position, &minions)),
            };
            GroupSteering {
                state: group.state,
                leader: group.leader,
                goal,
                members,
                profile: *creatures.get(group.creature),
            }
        })
        .collect();

    // COMPUTE PHASE
    #[cfg(feature = "parallel")]
    let steered: Vec<Vec<(Entity, Velocity)>> = groups.par_iter().map(steer_group).collect();

    #[cfg(not(feature = "parallel"))]
    let steered: Vec<Vec<(Entity, Velocity)>> = groups.iter().map(steer_group).collect();

    // APPLY PHASE
    for (entity, new_velocity) in steered.into_iter().flatten() {
        if let Ok((_, mut velocity, _)) = bodies.get_mut(entity) {
            *velocity = new_velocity;
        }
    }
}

// ============================================================================
// MINION FOLLOW SYSTEM
// ============================================================================

/// System that keeps minions trailing the player.
///
/// Minions seek the player, stop at the follow distance and keep apart from
/// other player-side entities.
pub fn minion_follow_system(
    config: Res<SimConfig>,
    creatures: Res<CreatureTable>,
    session: Res<PlayerSession>,
    grid: Res<SpatialGrid>,
    mut minions: Query<(Entity, &Position, &mut Velocity, &CreatureType, &Lifecycle), With<Minion>>,
) {
    let player = session.position;
    for (entity, pos, mut vel, creature, lifecycle) in minions.iter_mut() {
        if !lifecycle.is_alive() {
            continue;
        }
        let p = creatures.get(*creature);

        let mut push = Velocity::ZERO;
        for other in grid.query_faction(pos.x, pos.y, p.separation_radius, Faction::Player) {
            let d = pos.distance_to(&Position::new(other.x, other.y));
            if other.id != entity && d > 0.0 {
                push = push.plus(Velocity::new(pos.x - other.x, pos.y - other.y).scaled(1.0 / d));
            }
        }

        let distance = pos.distance_to(&player);
        let arrival = ((distance - config.minion_follow_distance) / p.arrival_radius).clamp(0.0, 1.0);
        let steering = push
            .normalized()
            .scaled(p.separation_weight)
            .plus(pos.direction_to(&player).scaled(p.seek_weight));

        *vel = steering.normalized().scaled(p.move_speed * arrival);
    }
}
