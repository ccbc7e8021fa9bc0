//! Taming: turning corpses into player minions.
//!
//! Killing anything fills the soul meter; a tame request spends soul to
//! revive the nearest corpse in range on the player's side. Corpses that are
//! not tamed in time are removed from play.

use crate::components::*;
use crate::config::{CreatureTable, SoulConfig};
use crate::groups::GroupRegistry;
use crate::spatial::SpatialGrid;
use crate::systems::movement::SimTick;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// SOUL METER
// ============================================================================

/// Consumable resource gating taming. `amount` never leaves `[0, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoulMeter {
    amount: u32,
    table: SoulConfig,
}

impl SoulMeter {
    pub fn new(table: SoulConfig) -> Self {
        Self { amount: 0, table }
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn max(&self) -> u32 {
        self.table.max
    }

    pub fn cost_for(&self, size: CreatureSize) -> u32 {
        self.table.cost_for(size)
    }

    /// Credit one kill, capped at the maximum.
    pub fn gain_kill(&mut self) {
        self.amount = (self.amount + self.table.gain_per_kill).min(self.table.max);
    }

    /// Spend `cost` if the meter holds at least that much.
    pub fn try_spend(&mut self, cost: u32) -> bool {
        if self.amount < cost {
            return false;
        }
        self.amount -= cost;
        true
    }
}

/// Serializable view of the soul meter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoulSummary {
    pub amount: u32,
    pub max: u32,
}

impl From<&SoulMeter> for SoulSummary {
    fn from(meter: &SoulMeter) -> Self {
        Self { amount: meter.amount(), max: meter.max() }
    }
}

// ============================================================================
// PLAYER SESSION
// ============================================================================

/// Everything the simulation tracks about the player: where they stand,
/// their soul meter and their minion roster.
#[derive(Resource, Debug, Clone)]
pub struct PlayerSession {
    pub position: Position,
    pub soul: SoulMeter,
    /// Minions in the order they were tamed.
    pub minions: Vec<EntityId>,
}

impl PlayerSession {
    pub fn new(soul: SoulConfig) -> Self {
        Self {
            position: Position::default(),
            soul: SoulMeter::new(soul),
            minions: Vec::new(),
        }
    }
}

impl Default for PlayerSession {
    fn default() -> Self {
        Self::new(SoulConfig::default())
    }
}

// ============================================================================
// TAMING
// ============================================================================

/// Outcome of a tame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TameResult {
    Success(EntityId),
    NoCorpseInRange,
    InsufficientSoul,
}

/// Try to tame the nearest corpse within `radius` of `origin`.
///
/// Corpses at equal distance resolve in grid order. On success the corpse
/// is revived at full health as a Player minion, detached from its group and
/// appended to the session's roster. Failures leave everything untouched.
pub fn request_tame(world: &mut World, session: &mut PlayerSession, origin: Position, radius: f32) -> TameResult {
    let candidates = world.resource::<SpatialGrid>().query_ids(origin.x, origin.y, radius);
    let corpse = candidates.into_iter().find(|&e| {
        world
            .get::<Lifecycle>(e)
            .map(Lifecycle::is_corpse)
            .unwrap_or(false)
    });
    let Some(corpse) = corpse else {
        return TameResult::NoCorpseInRange;
    };

    let (Some(&creature), Some(&id)) = (world.get::<CreatureType>(corpse), world.get::<EntityId>(corpse)) else {
        return TameResult::NoCorpseInRange;
    };
    let cost = session.soul.cost_for(world.resource::<CreatureTable>().get(creature).size);
    if !session.soul.try_spend(cost) {
        return TameResult::InsufficientSoul;
    }

    let former_group = world.get::<GroupMember>(corpse).map(|m| m.0);
    if let Some(group) = former_group {
        let alive: Vec<Entity> = world
            .resource::<GroupRegistry>()
            .get(group)
            .map(|g| g.members.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|&m| world.get::<Lifecycle>(m).map(Lifecycle::is_alive).unwrap_or(false))
            .collect();
        world
            .resource_mut::<GroupRegistry>()
            .detach_member(group, corpse, |m| alive.contains(&m));
    }

    let mut entity = world.entity_mut(corpse);
    entity.remove::<(GroupMember, HomeRegion)>();
    entity.insert((Faction::Player, Lifecycle::Alive, Minion, Velocity::ZERO, ContactAttack::default()));
    if let Some(mut health) = entity.get_mut::<Health>() {
        health.restore();
    }
    world.resource_mut::<SpatialGrid>().set_faction(corpse, Faction::Player);
    session.minions.push(id);

    log::info!(
        "tamed {:?} {:?} for {} soul ({} left, {} minions)",
        creature,
        id,
        cost,
        session.soul.amount(),
        session.minions.len()
    );
    TameResult::Success(id)
}

/// System that removes corpses whose tame window has elapsed.
///
/// Expired corpses become `Removed` tombstones and leave the spatial index.
pub fn corpse_expiry_system(
    tick: Res<SimTick>,
    mut grid: ResMut<SpatialGrid>,
    mut query: Query<(Entity, &EntityId, &mut Lifecycle)>,
) {
    for (entity, id, mut lifecycle) in query.iter_mut() {
        if let Lifecycle::Corpse { expires_at } = *lifecycle {
            if tick.0 >= expires_at {
                *lifecycle = Lifecycle::Removed;
                grid.remove(entity);
                log::debug!("corpse {:?} expired", id);
            }
        }
    }
}
