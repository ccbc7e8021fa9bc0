//! ECS Systems for the horde simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## System Order
//!
//! All systems run in one chain per tick (see [`crate::api::SimWorld`]):
//!
//! **Spatial/Groups** - Bring derived data up to date:
//! - `spatial_sync_system` - Reindexes moved, retagged or removed entities
//! - `group_refresh_system` - Centroids, leaders, dissolution
//!
//! **Decisions** - Read the spatial grid and group registry:
//! - `aggro_system` - Hysteresis transitions and chain propagation
//! - `wander_system` - Idle leaders pick wander points
//!
//! **Steering** - Gather, compute (optionally parallel), apply:
//! - `flocking_system` - Boids for enemy groups
//! - `minion_follow_system` - Minions trail the player
//!
//! **Core Simulation**:
//! - `movement_system` - Applies velocity to position
//! - `contact_system` - Melee contact damage
//! - `death_system` - Living entities at zero health become corpses
//! - `corpse_expiry_system` - Untamed corpses are removed

pub mod aggro;
pub mod combat;
pub mod faction;
pub mod flocking;
pub mod movement;
pub mod tame;

pub use aggro::*;
pub use combat::*;
pub use faction::*;
pub use flocking::*;
pub use movement::*;
pub use tame::*;
