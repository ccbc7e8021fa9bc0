//! Error types for world configuration.

use thiserror::Error;

use crate::components::{CreatureSize, CreatureType};

/// Configuration problems detected when the world is built or initialized.
///
/// Nothing in here is ever raised mid-simulation; a world that passed
/// validation runs without fallible operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// JSON configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The creature table lacks an entry for a creature type.
    #[error("creature table has no profile for {0:?}")]
    MissingCreature(CreatureType),

    /// Aggro and deaggro radii would not produce hysteresis.
    #[error("{creature:?}: aggro radius {aggro} must be smaller than deaggro radius {deaggro}")]
    UnstableHysteresis {
        creature: CreatureType,
        aggro: f32,
        deaggro: f32,
    },

    /// A creature profile field is out of range.
    #[error("{creature:?}: {field} must be {expected}, got {value}")]
    InvalidProfile {
        creature: CreatureType,
        field: &'static str,
        expected: &'static str,
        value: f32,
    },

    /// Poisson-disk spacing must be a positive finite distance.
    #[error("region {region}: minimum distance must be positive and finite, got {value}")]
    InvalidMinDistance { region: u32, value: f32 },

    /// Region rectangle is empty, inverted or not finite.
    #[error("region {region}: bounds must be finite with positive width and height")]
    InvalidBounds { region: u32 },

    /// Region allows no creature types.
    #[error("region {region}: no allowed creature types")]
    NoCreatureTypes { region: u32 },

    /// Group size range is empty or inverted.
    #[error("region {region}: group size range {min}..={max} is invalid")]
    InvalidGroupSize { region: u32, min: u32, max: u32 },

    /// Spawner needs at least one candidate per active point.
    #[error("region {region}: max spawn attempts must be at least 1")]
    InvalidMaxAttempts { region: u32 },

    /// Difficulty tiers start at 1.
    #[error("region {region}: difficulty tier must be at least 1")]
    InvalidDifficultyTier { region: u32 },

    /// Two regions share an id.
    #[error("region id {0} is used more than once")]
    DuplicateRegion(u32),

    /// A simulation-wide setting is out of range.
    #[error("setting `{field}` is invalid: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// A taming cost can never be paid.
    #[error("tame cost {cost} for {size:?} creatures exceeds the soul meter maximum {max}")]
    UnreachableTameCost {
        size: CreatureSize,
        cost: u32,
        max: u32,
    },
}
