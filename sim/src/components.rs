//! ECS Components for the horde simulation.
//!
//! Components are pure data containers attached to entities.
//! All game logic lives in systems that query these components.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::groups::GroupId;

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// 2D position in world units (one unit = one tile).
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        self.distance_sq_to(other).sqrt()
    }

    pub fn distance_sq_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Unit vector pointing from `self` toward `other`, or zero when they coincide.
    pub fn direction_to(&self, other: &Position) -> Velocity {
        Velocity::new(other.x - self.x, other.y - self.y).normalized()
    }
}

impl From<(f32, f32)> for Position {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// 2D velocity vector. Also used for the unit-length steering terms.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { vx: 0.0, vy: 0.0 };

    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    /// Unit-length copy. Near-zero vectors stay zero instead of blowing up.
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self {
                vx: self.vx / mag,
                vy: self.vy / mag,
            }
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            vx: self.vx * factor,
            vy: self.vy * factor,
        }
    }

    pub fn plus(&self, other: Velocity) -> Self {
        Self {
            vx: self.vx + other.vx,
            vy: self.vy + other.vy,
        }
    }

    pub fn minus(&self, other: Velocity) -> Self {
        Self {
            vx: self.vx - other.vx,
            vy: self.vy - other.vy,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude() < 0.0001
    }
}

/// Facing angle in radians, following the last non-zero velocity.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Heading(pub f32);

/// Axis-aligned rectangle in world units.
///
/// `contains` is half-open (`min <= p < max`) so adjacent regions never share a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.width() > 0.0
            && self.height() > 0.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x < self.max_x && y >= self.min_y && y < self.max_y
    }

    /// Clamp a point into the closed rectangle.
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(self.min_x, self.max_x), y.clamp(self.min_y, self.max_y))
    }

    /// Distance from an interior point to the nearest edge.
    pub fn edge_distance(&self, x: f32, y: f32) -> f32 {
        (x - self.min_x)
            .min(self.max_x - x)
            .min(y - self.min_y)
            .min(self.max_y - y)
    }
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Stable identifier handed to hosts (renderer, minimap, animation layer).
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Side an entity fights for. Compared by value.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    #[default]
    Wild,
    Player,
}

/// Creature kind. Keys the per-type tables in [`crate::config::CreatureTable`].
#[derive(
    Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum CreatureType {
    Slime,
    Wolf,
    Skeleton,
    Ogre,
}

impl CreatureType {
    pub const COUNT: usize = 4;
    pub const ALL: [CreatureType; Self::COUNT] = [
        CreatureType::Slime,
        CreatureType::Wolf,
        CreatureType::Skeleton,
        CreatureType::Ogre,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Body size class; decides the soul cost of taming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreatureSize {
    Small,
    Medium,
    Large,
}

/// Group the entity currently belongs to.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMember(pub GroupId);

/// Region an enemy was spawned in. Movement keeps the entity inside `bounds`.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct HomeRegion {
    pub id: u32,
    pub bounds: Bounds,
}

/// Marker for entities on the player's minion roster.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Minion;

// ============================================================================
// COMBAT COMPONENTS
// ============================================================================

/// Health of a single entity.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn restore(&mut self) {
        self.current = self.max;
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Lifecycle of an entity: alive, a tameable corpse, or gone for good.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    #[default]
    Alive,
    /// Dead but still tameable until the simulation tick `expires_at`.
    Corpse { expires_at: u64 },
    /// Dropped from the spatial index. Kept as a tombstone so ids stay queryable.
    Removed,
}

impl Lifecycle {
    pub fn is_alive(&self) -> bool {
        matches!(self, Lifecycle::Alive)
    }

    pub fn is_corpse(&self) -> bool {
        matches!(self, Lifecycle::Corpse { .. })
    }
}

/// Melee contact attack state. Stats come from the creature profile.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ContactAttack {
    /// Seconds until the next strike is allowed.
    pub cooldown: f32,
}

// ============================================================================
// BUNDLE HELPERS
// ============================================================================

/// Bundle for spawning one enemy. Group membership is attached once the
/// group exists.
#[derive(Bundle)]
pub struct EnemyBundle {
    pub id: EntityId,
    pub position: Position,
    pub velocity: Velocity,
    pub heading: Heading,
    pub health: Health,
    pub faction: Faction,
    pub creature: CreatureType,
    pub lifecycle: Lifecycle,
    pub attack: ContactAttack,
    pub home: HomeRegion,
}

impl EnemyBundle {
    pub fn new(
        id: EntityId,
        creature: CreatureType,
        position: Position,
        max_health: f32,
        home: HomeRegion,
    ) -> Self {
        Self {
            id,
            position,
            velocity: Velocity::default(),
            heading: Heading::default(),
            health: Health::new(max_health),
            faction: Faction::Wild,
            creature,
            lifecycle: Lifecycle::Alive,
            attack: ContactAttack::default(),
            home,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_zero_vector_stays_zero() {
        let v = Velocity::new(0.0, 0.0).normalized();
        assert_eq!(v, Velocity::ZERO);

        let v = Velocity::new(3.0, 4.0).normalized();
        assert!((v.magnitude() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_bounds_half_open() {
        let b = Bounds::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains(0.0, 0.0));
        assert!(!b.contains(10.0, 5.0));
        assert_eq!(b.clamp(12.0, -1.0), (10.0, 0.0));
        assert!((b.edge_distance(2.0, 5.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_health_damage_clamps_at_zero() {
        let mut h = Health::new(20.0);
        h.damage(25.0);
        assert_eq!(h.current, 0.0);
        assert!(!h.is_alive());
        h.restore();
        assert_eq!(h.current, 20.0);
    }
}
