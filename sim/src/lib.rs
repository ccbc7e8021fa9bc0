//! Horde Simulation Core
//!
//! A deterministic, fixed-timestep ECS simulation of wild enemy groups:
//! blue-noise spawning, group flocking, aggro chains and corpse taming.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod groups;
pub mod spatial;
pub mod spawner;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use components::*;
pub use config::{CreatureProfile, CreatureTable, GroupSizeRange, RegionConfig, SimConfig, SoulConfig, WorldConfig};
pub use error::ConfigError;
pub use groups::{AggroState, AggroTarget, EnemyGroup, GroupId, GroupRegistry};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use spawner::{PoissonDiskSampler, SpawnReport};
pub use systems::*;
pub use world::{EntitySnapshot, GroupSnapshot, Snapshot};
