//! Static configuration tables.
//!
//! Creature, region and soul tables are plain data supplied by the host
//! (usually as JSON) and validated once when the world is built. Nothing
//! here is hardcoded into the systems; they look values up by creature tag.

use crate::components::{Bounds, CreatureSize, CreatureType};
use crate::error::ConfigError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// SIMULATION SETTINGS
// ============================================================================

/// Simulation-wide tuning. Distances are world units (one unit = one tile).
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed timestep in seconds used by [`crate::api::SimWorld::step`].
    pub fixed_timestep: f32,
    /// Same-type groups whose centroids lie within this distance of a newly
    /// aggroed group join the chase.
    pub chain_radius: f32,
    /// Shortest time a leader keeps a wander point.
    pub wander_interval_min: f32,
    /// Longest time a leader keeps a wander point.
    pub wander_interval_max: f32,
    pub wander_distance_min: f32,
    pub wander_distance_max: f32,
    /// A leader this close to its region edge is considered to have hit the boundary.
    pub boundary_margin: f32,
    /// Radius around a spawn point that members are scattered in.
    pub member_jitter: f32,
    /// Minimum seconds a group stays Aggro once it enters the state.
    /// Zero leaves the deaggro radius as the only way back to Idle.
    pub aggro_lock_secs: f32,
    /// Ticks a corpse stays tameable before it is removed.
    pub corpse_expiry_ticks: u64,
    /// Distance minions keep from the player while following.
    pub minion_follow_distance: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 30.0, // 30 Hz
            chain_radius: 10.0,
            wander_interval_min: 3.0,
            wander_interval_max: 5.0,
            wander_distance_min: 5.0,
            wander_distance_max: 15.0,
            boundary_margin: 0.5,
            member_jitter: 1.5,
            aggro_lock_secs: 3.0,
            corpse_expiry_ticks: 300, // 10 s at 30 Hz
            minion_follow_distance: 3.0,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| ConfigError::InvalidSetting { field, reason };

        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(invalid("fixed_timestep", format!("must be positive, got {}", self.fixed_timestep)));
        }
        for (field, value) in [
            ("chain_radius", self.chain_radius),
            ("boundary_margin", self.boundary_margin),
            ("member_jitter", self.member_jitter),
            ("aggro_lock_secs", self.aggro_lock_secs),
            ("minion_follow_distance", self.minion_follow_distance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, format!("must be non-negative, got {value}")));
            }
        }
        if !(self.wander_interval_min > 0.0 && self.wander_interval_min <= self.wander_interval_max) {
            return Err(invalid(
                "wander_interval_min",
                format!(
                    "range {}..{} must be positive and ordered",
                    self.wander_interval_min, self.wander_interval_max
                ),
            ));
        }
        if !(self.wander_distance_min > 0.0 && self.wander_distance_min <= self.wander_distance_max) {
            return Err(invalid(
                "wander_distance_min",
                format!(
                    "range {}..{} must be positive and ordered",
                    self.wander_distance_min, self.wander_distance_max
                ),
            ));
        }
        if self.corpse_expiry_ticks == 0 {
            return Err(invalid("corpse_expiry_ticks", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// CREATURE TABLE
// ============================================================================

/// Per-creature tuning: steering weights, radii, speed and contact attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreatureProfile {
    pub size: CreatureSize,
    pub max_health: f32,
    /// Movement speed in units per second.
    pub move_speed: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    /// Weight of the wander/leader/target seek term.
    pub seek_weight: f32,
    pub separation_radius: f32,
    /// Members slow down linearly inside this distance of their seek point.
    pub arrival_radius: f32,
    pub aggro_radius: f32,
    pub deaggro_radius: f32,
    pub contact_radius: f32,
    pub contact_damage: f32,
    /// Seconds between contact strikes.
    pub attack_cooldown: f32,
}

impl CreatureProfile {
    /// Small jelly that moves in tight packs.
    pub fn slime() -> Self {
        Self {
            size: CreatureSize::Small,
            max_health: 20.0,
            move_speed: 2.5,
            separation_weight: 1.5,
            alignment_weight: 0.2,
            cohesion_weight: 1.2,
            seek_weight: 1.0,
            separation_radius: 1.2,
            arrival_radius: 1.5,
            aggro_radius: 8.0,
            deaggro_radius: 12.0,
            contact_radius: 0.8,
            contact_damage: 4.0,
            attack_cooldown: 1.0,
        }
    }

    /// Fast pack hunter.
    pub fn wolf() -> Self {
        Self {
            size: CreatureSize::Medium,
            max_health: 35.0,
            move_speed: 4.5,
            separation_weight: 1.0,
            alignment_weight: 0.8,
            cohesion_weight: 0.8,
            seek_weight: 1.2,
            separation_radius: 1.5,
            arrival_radius: 2.0,
            aggro_radius: 12.0,
            deaggro_radius: 18.0,
            contact_radius: 1.0,
            contact_damage: 8.0,
            attack_cooldown: 0.8,
        }
    }

    pub fn skeleton() -> Self {
        Self {
            size: CreatureSize::Medium,
            max_health: 40.0,
            move_speed: 2.0,
            separation_weight: 1.0,
            alignment_weight: 0.5,
            cohesion_weight: 0.6,
            seek_weight: 1.0,
            separation_radius: 1.5,
            arrival_radius: 2.0,
            aggro_radius: 10.0,
            deaggro_radius: 15.0,
            contact_radius: 1.0,
            contact_damage: 6.0,
            attack_cooldown: 1.2,
        }
    }

    /// Spread-out brute: strong separation, little alignment or cohesion.
    pub fn ogre() -> Self {
        Self {
            size: CreatureSize::Large,
            max_health: 120.0,
            move_speed: 1.6,
            separation_weight: 2.0,
            alignment_weight: 0.1,
            cohesion_weight: 0.2,
            seek_weight: 1.0,
            separation_radius: 3.0,
            arrival_radius: 3.0,
            aggro_radius: 9.0,
            deaggro_radius: 14.0,
            contact_radius: 1.8,
            contact_damage: 20.0,
            attack_cooldown: 2.0,
        }
    }

    pub fn validate(&self, creature: CreatureType) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, expected: &'static str, value: f32| {
            Err(ConfigError::InvalidProfile { creature, field, expected, value })
        };

        for (field, value) in [
            ("max_health", self.max_health),
            ("move_speed", self.move_speed),
            ("separation_radius", self.separation_radius),
            ("arrival_radius", self.arrival_radius),
            ("aggro_radius", self.aggro_radius),
            ("contact_radius", self.contact_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return invalid(field, "positive and finite", value);
            }
        }
        for (field, value) in [
            ("separation_weight", self.separation_weight),
            ("alignment_weight", self.alignment_weight),
            ("cohesion_weight", self.cohesion_weight),
            ("seek_weight", self.seek_weight),
            ("contact_damage", self.contact_damage),
            ("attack_cooldown", self.attack_cooldown),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return invalid(field, "non-negative and finite", value);
            }
        }
        if !self.deaggro_radius.is_finite() || self.aggro_radius >= self.deaggro_radius {
            return Err(ConfigError::UnstableHysteresis {
                creature,
                aggro: self.aggro_radius,
                deaggro: self.deaggro_radius,
            });
        }
        Ok(())
    }

    /// Largest radius any per-tick query for this creature uses.
    pub fn max_query_radius(&self) -> f32 {
        self.aggro_radius
            .max(self.separation_radius)
            .max(self.contact_radius)
    }
}

/// Creature profiles indexed by [`CreatureType`].
///
/// Serialized as a map from creature name to profile; every creature type must
/// be present.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<CreatureType, CreatureProfile>",
    into = "BTreeMap<CreatureType, CreatureProfile>"
)]
pub struct CreatureTable {
    profiles: Vec<CreatureProfile>,
}

impl CreatureTable {
    pub fn from_map(mut map: BTreeMap<CreatureType, CreatureProfile>) -> Result<Self, ConfigError> {
        let profiles = CreatureType::ALL
            .iter()
            .map(|creature| map.remove(creature).ok_or(ConfigError::MissingCreature(*creature)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { profiles })
    }

    #[inline]
    pub fn get(&self, creature: CreatureType) -> &CreatureProfile {
        &self.profiles[creature.index()]
    }

    /// Replace one creature's profile.
    pub fn with_profile(mut self, creature: CreatureType, profile: CreatureProfile) -> Self {
        self.profiles[creature.index()] = profile;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for creature in CreatureType::ALL {
            self.get(creature).validate(creature)?;
        }
        Ok(())
    }

    /// Cell size for the per-tick entity grid.
    pub fn max_query_radius(&self) -> f32 {
        self.profiles
            .iter()
            .map(CreatureProfile::max_query_radius)
            .fold(0.0, f32::max)
    }
}

impl Default for CreatureTable {
    fn default() -> Self {
        Self {
            profiles: vec![
                CreatureProfile::slime(),
                CreatureProfile::wolf(),
                CreatureProfile::skeleton(),
                CreatureProfile::ogre(),
            ],
        }
    }
}

impl TryFrom<BTreeMap<CreatureType, CreatureProfile>> for CreatureTable {
    type Error = ConfigError;

    fn try_from(map: BTreeMap<CreatureType, CreatureProfile>) -> Result<Self, Self::Error> {
        Self::from_map(map)
    }
}

impl From<CreatureTable> for BTreeMap<CreatureType, CreatureProfile> {
    fn from(table: CreatureTable) -> Self {
        CreatureType::ALL.into_iter().zip(table.profiles).collect()
    }
}

// ============================================================================
// REGIONS
// ============================================================================

/// Inclusive range of members per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSizeRange {
    pub min: u32,
    pub max: u32,
}

impl GroupSizeRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

fn default_difficulty_tier() -> u32 {
    1
}

fn default_max_attempts() -> u32 {
    30
}

/// A rectangular area of the world and what spawns in it. Immutable after setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub id: u32,
    pub bounds: Bounds,
    pub allowed_types: Vec<CreatureType>,
    /// Minimum distance between two group spawn points.
    pub min_distance: f32,
    pub group_size: GroupSizeRange,
    #[serde(default = "default_difficulty_tier")]
    pub difficulty_tier: u32,
    /// Candidates generated per active point before it is retired.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl RegionConfig {
    pub fn new(
        id: u32,
        bounds: Bounds,
        allowed_types: Vec<CreatureType>,
        min_distance: f32,
        group_size: GroupSizeRange,
    ) -> Self {
        Self {
            id,
            bounds,
            allowed_types,
            min_distance,
            group_size,
            difficulty_tier: default_difficulty_tier(),
            max_attempts: default_max_attempts(),
        }
    }

    /// Member max-health multiplier for this region's tier.
    pub fn health_multiplier(&self) -> f32 {
        1.0 + 0.25 * self.difficulty_tier.saturating_sub(1) as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let region = self.id;
        if !self.bounds.is_valid() {
            return Err(ConfigError::InvalidBounds { region });
        }
        if !(self.min_distance.is_finite() && self.min_distance > 0.0) {
            return Err(ConfigError::InvalidMinDistance { region, value: self.min_distance });
        }
        if self.allowed_types.is_empty() {
            return Err(ConfigError::NoCreatureTypes { region });
        }
        let GroupSizeRange { min, max } = self.group_size;
        if min == 0 || min > max {
            return Err(ConfigError::InvalidGroupSize { region, min, max });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts { region });
        }
        if self.difficulty_tier == 0 {
            return Err(ConfigError::InvalidDifficultyTier { region });
        }
        Ok(())
    }
}

/// Validate a region set: each region on its own, then id uniqueness.
pub fn validate_regions(regions: &[RegionConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for region in regions {
        region.validate()?;
        if !seen.insert(region.id) {
            return Err(ConfigError::DuplicateRegion(region.id));
        }
    }
    Ok(())
}

/// Parse a JSON array of regions.
pub fn regions_from_json(json: &str) -> Result<Vec<RegionConfig>, ConfigError> {
    let regions: Vec<RegionConfig> = serde_json::from_str(json)?;
    validate_regions(&regions)?;
    Ok(regions)
}

// ============================================================================
// SOUL TABLE
// ============================================================================

/// Soul meter limits and taming prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoulConfig {
    pub max: u32,
    pub gain_per_kill: u32,
    pub cost_small: u32,
    pub cost_medium: u32,
    pub cost_large: u32,
}

impl Default for SoulConfig {
    fn default() -> Self {
        Self {
            max: 100,
            gain_per_kill: 10,
            cost_small: 10,
            cost_medium: 20,
            cost_large: 40,
        }
    }
}

impl SoulConfig {
    pub fn cost_for(&self, size: CreatureSize) -> u32 {
        match size {
            CreatureSize::Small => self.cost_small,
            CreatureSize::Medium => self.cost_medium,
            CreatureSize::Large => self.cost_large,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for size in [CreatureSize::Small, CreatureSize::Medium, CreatureSize::Large] {
            let cost = self.cost_for(size);
            if cost > self.max {
                return Err(ConfigError::UnreachableTameCost { size, cost, max: self.max });
            }
        }
        Ok(())
    }
}

// ============================================================================
// WORLD CONFIG
// ============================================================================

/// Everything a [`crate::api::SimWorld`] needs besides regions and a seed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub sim: SimConfig,
    pub creatures: CreatureTable,
    pub soul: SoulConfig,
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sim.validate()?;
        self.creatures.validate()?;
        self.soul.validate()
    }
}
