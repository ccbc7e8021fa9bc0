//! Contact combat and death handling.
//!
//! ## Two Phases
//!
//! 1. **Gather**: every ready attacker picks the nearest entity it may
//!    attack within its contact radius; hits accumulate in [`ContactResults`]
//! 2. **Apply**: accumulated damage is written to health
//!
//! Deaths are resolved afterwards by [`death_system`]: the entity becomes a
//! corpse that stays in the spatial index for taming, and the kill feeds the
//! soul meter.
//!
//! The player is not an entity. Hostile contact with the player is recorded
//! as a [`PlayerContact`] for the host to apply.

use crate::components::*;
use crate::config::{CreatureTable, SimConfig};
use crate::groups::{AggroTarget, GroupRegistry};
use crate::spatial::SpatialGrid;
use crate::systems::movement::{DeltaTime, SimTick};
use crate::systems::tame::PlayerSession;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Damage collected during the gather phase.
#[derive(Default, Clone, Debug)]
pub struct ContactResults {
    pub damage: HashMap<Entity, f32>,
}

/// A wild creature reaching the player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerContact {
    pub attacker: EntityId,
    pub creature: CreatureType,
    pub damage: f32,
    pub tick: u64,
}

/// Player contacts not yet collected by the host.
#[derive(Resource, Default, Debug)]
pub struct ContactLog(pub Vec<PlayerContact>);

/// Result of damage applied from outside the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DamageOutcome {
    Damaged { remaining: f32 },
    Killed,
    /// Target was already a corpse or removed; nothing happened.
    AlreadyDead,
}

/// System that resolves melee contact between hostile entities.
///
/// Wild creatures only strike while their group is aggroed; minions strike
/// whenever something hostile is in reach.
///
/// ## Data Access
/// - Reads: DeltaTime, SimTick, CreatureTable, SpatialGrid, GroupRegistry, PlayerSession
/// - Writes: ContactAttack, Health, ContactLog
pub fn contact_system(
    dt: Res<DeltaTime>,
    tick: Res<SimTick>,
    creatures: Res<CreatureTable>,
    grid: Res<SpatialGrid>,
    registry: Res<GroupRegistry>,
    session: Res<PlayerSession>,
    mut contacts: ResMut<ContactLog>,
    mut attackers: Query<(
        Entity,
        &EntityId,
        &Position,
        &Faction,
        &CreatureType,
        &Lifecycle,
        &mut ContactAttack,
        Option<&GroupMember>,
        Has<Minion>,
    )>,
    mut targets: Query<(&mut Health, &Lifecycle)>,
) {
    let delta = dt.0;
    let player = session.position;
    let mut results = ContactResults::default();

    for (entity, id, pos, faction, creature, lifecycle, mut attack, member, is_minion) in attackers.iter_mut() {
        if !lifecycle.is_alive() {
            continue;
        }
        attack.cooldown = (attack.cooldown - delta).max(0.0);
        if attack.cooldown > 0.0 {
            continue;
        }

        let group = member.and_then(|m| registry.get(m.0));
        let hostile = is_minion || group.map_or(false, |g| g.is_aggro());
        if !hostile {
            continue;
        }

        let profile = creatures.get(*creature);
        let nearest = grid
            .query_attackable(pos.x, pos.y, profile.contact_radius, *faction)
            .into_iter()
            .find(|e| {
                e.id != entity
                    && targets
                        .get(e.id)
                        .map(|(_, l)| l.is_alive())
                        .unwrap_or(false)
            })
            .map(|e| (e.id, pos.distance_to(&Position::new(e.x, e.y))));

        let player_distance = pos.distance_to(&player);
        let reaches_player = *faction == Faction::Wild
            && group.map_or(false, |g| g.target == Some(AggroTarget::Player))
            && player_distance <= profile.contact_radius;

        match nearest {
            Some((target, d)) if !reaches_player || d <= player_distance => {
                *results.damage.entry(target).or_insert(0.0) += profile.contact_damage;
            }
            _ if reaches_player => {
                contacts.0.push(PlayerContact {
                    attacker: *id,
                    creature: *creature,
                    damage: profile.contact_damage,
                    tick: tick.0,
                });
            }
            _ => continue,
        }
        attack.cooldown = profile.attack_cooldown;
    }

    for (entity, damage) in results.damage {
        if let Ok((mut health, _)) = targets.get_mut(entity) {
            health.damage(damage);
        }
    }
}

/// Lifecycle for an entity dying at tick `now`.
fn corpse_until(now: u64, config: &SimConfig) -> Lifecycle {
    Lifecycle::Corpse {
        expires_at: now + config.corpse_expiry_ticks,
    }
}

/// Credit a kill to the player and drop a dead minion from the roster.
fn record_kill(session: &mut PlayerSession, id: EntityId, was_minion: bool) {
    session.soul.gain_kill();
    if was_minion {
        session.minions.retain(|&m| m != id);
    }
}

/// System that turns living entities with no health left into corpses.
pub fn death_system(
    tick: Res<SimTick>,
    config: Res<SimConfig>,
    mut session: ResMut<PlayerSession>,
    mut query: Query<(&EntityId, &Health, &mut Lifecycle, &mut Velocity, Has<Minion>)>,
) {
    for (id, health, mut lifecycle, mut velocity, is_minion) in query.iter_mut() {
        if !lifecycle.is_alive() || health.is_alive() {
            continue;
        }
        *lifecycle = corpse_until(tick.0, &config);
        *velocity = Velocity::ZERO;
        record_kill(&mut session, *id, is_minion);
        log::debug!("{:?} died at tick {}", id, tick.0);
    }
}

/// Apply `amount` damage to a living entity, resolving a death immediately.
pub fn apply_damage(world: &mut World, entity: Entity, amount: f32) -> DamageOutcome {
    let alive = world
        .get::<Lifecycle>(entity)
        .map(Lifecycle::is_alive)
        .unwrap_or(false);
    if !alive {
        return DamageOutcome::AlreadyDead;
    }
    let Some(mut health) = world.get_mut::<Health>(entity) else {
        return DamageOutcome::AlreadyDead;
    };
    health.damage(amount.max(0.0));
    if health.is_alive() {
        return DamageOutcome::Damaged { remaining: health.current };
    }

    let lifecycle = corpse_until(world.resource::<SimTick>().0, world.resource::<SimConfig>());
    let was_minion = world.get::<Minion>(entity).is_some();
    if let Some(mut l) = world.get_mut::<Lifecycle>(entity) {
        *l = lifecycle;
    }
    if let Some(mut v) = world.get_mut::<Velocity>(entity) {
        *v = Velocity::ZERO;
    }
    if let Some(&id) = world.get::<EntityId>(entity) {
        record_kill(&mut world.resource_mut::<PlayerSession>(), id, was_minion);
    }
    DamageOutcome::Killed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::{AggroState, GroupId};
    use crate::spatial::spatial_sync_system;

    fn test_world() -> World {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimTick(5));
        world.insert_resource(SimConfig::default());
        world.insert_resource(CreatureTable::default());
        world.insert_resource(SpatialGrid::<Entity>::new(4.0));
        world.insert_resource(GroupRegistry::new(10.0));
        world.insert_resource(PlayerSession::default());
        world.insert_resource(ContactLog::default());
        world
    }

    fn spawn_fighter(world: &mut World, id: u32, creature: CreatureType, faction: Faction, x: f32) -> Entity {
        let hp = world.resource::<CreatureTable>().get(creature).max_health;
        world
            .spawn((
                EntityId(id),
                Position::new(x, 0.0),
                Velocity::new(1.0, 0.0),
                Health::new(hp),
                faction,
                creature,
                Lifecycle::Alive,
                ContactAttack::default(),
            ))
            .id()
    }

    fn wild_group(world: &mut World, members: &[Entity], state: AggroState, target: Option<AggroTarget>) -> GroupId {
        let mut registry = world.resource_mut::<GroupRegistry>();
        let id = registry.create(1, CreatureType::Wolf, members.to_vec(), (0.0, 0.0));
        if let Some(group) = registry.get_mut(id) {
            group.state = state;
            group.target = target;
        }
        for &m in members {
            world.entity_mut(m).insert(GroupMember(id));
        }
        id
    }

    fn run(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_sync_system, contact_system, death_system).chain());
        schedule.run(world);
    }

    #[test]
    fn test_idle_wolves_do_not_bite() {
        let mut world = test_world();
        let wolf = spawn_fighter(&mut world, 1, CreatureType::Wolf, Faction::Wild, 0.0);
        let minion = spawn_fighter(&mut world, 2, CreatureType::Slime, Faction::Player, 0.5);
        world.entity_mut(minion).insert(Minion);
        wild_group(&mut world, &[wolf], AggroState::Idle, None);

        // Put the slime minion on cooldown so only the wolf could strike.
        world.get_mut::<ContactAttack>(minion).unwrap().cooldown = 10.0;
        run(&mut world);
        assert_eq!(world.get::<Health>(minion).unwrap().current, 20.0);
    }

    #[test]
    fn test_aggro_wolf_bites_minion_then_cools_down() {
        let mut world = test_world();
        let wolf = spawn_fighter(&mut world, 1, CreatureType::Wolf, Faction::Wild, 0.0);
        let minion = spawn_fighter(&mut world, 2, CreatureType::Slime, Faction::Player, 0.5);
        world.entity_mut(minion).insert(Minion);
        world.get_mut::<ContactAttack>(minion).unwrap().cooldown = 10.0;
        wild_group(&mut world, &[wolf], AggroState::Aggro, Some(AggroTarget::Minion(minion)));

        run(&mut world);
        assert_eq!(world.get::<Health>(minion).unwrap().current, 12.0);
        assert_eq!(world.get::<ContactAttack>(wolf).unwrap().cooldown, 0.8);

        run(&mut world);
        assert_eq!(world.get::<Health>(minion).unwrap().current, 12.0);
    }

    #[test]
    fn test_wild_never_hits_wild() {
        let mut world = test_world();
        let a = spawn_fighter(&mut world, 1, CreatureType::Wolf, Faction::Wild, 0.0);
        let b = spawn_fighter(&mut world, 2, CreatureType::Wolf, Faction::Wild, 0.5);
        wild_group(&mut world, &[a, b], AggroState::Aggro, Some(AggroTarget::Player));
        world.resource_mut::<PlayerSession>().position = Position::new(50.0, 0.0);

        run(&mut world);
        assert_eq!(world.get::<Health>(a).unwrap().current, 35.0);
        assert_eq!(world.get::<Health>(b).unwrap().current, 35.0);
        assert!(world.resource::<ContactLog>().0.is_empty());
    }

    #[test]
    fn test_player_contact_is_logged() {
        let mut world = test_world();
        let wolf = spawn_fighter(&mut world, 9, CreatureType::Wolf, Faction::Wild, 0.0);
        wild_group(&mut world, &[wolf], AggroState::Aggro, Some(AggroTarget::Player));
        world.resource_mut::<PlayerSession>().position = Position::new(0.6, 0.0);

        run(&mut world);
        let log = &world.resource::<ContactLog>().0;
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].attacker, EntityId(9));
        assert_eq!(log[0].damage, 8.0);
        assert_eq!(log[0].tick, 5);
    }

    #[test]
    fn test_minion_kill_creates_corpse_and_soul() {
        let mut world = test_world();
        let ogre = spawn_fighter(&mut world, 1, CreatureType::Ogre, Faction::Player, 0.0);
        world.entity_mut(ogre).insert(Minion);
        let slime = spawn_fighter(&mut world, 2, CreatureType::Slime, Faction::Wild, 1.0);
        wild_group(&mut world, &[slime], AggroState::Idle, None);

        run(&mut world);

        assert_eq!(*world.get::<Lifecycle>(slime).unwrap(), Lifecycle::Corpse { expires_at: 305 });
        assert_eq!(*world.get::<Velocity>(slime).unwrap(), Velocity::ZERO);
        assert_eq!(world.resource::<PlayerSession>().soul.amount(), 10);
    }

    #[test]
    fn test_apply_damage_outcomes() {
        let mut world = test_world();
        let wolf = spawn_fighter(&mut world, 3, CreatureType::Wolf, Faction::Player, 0.0);
        world.entity_mut(wolf).insert(Minion);
        world.resource_mut::<PlayerSession>().minions.push(EntityId(3));

        assert_eq!(apply_damage(&mut world, wolf, 10.0), DamageOutcome::Damaged { remaining: 25.0 });
        assert_eq!(apply_damage(&mut world, wolf, 40.0), DamageOutcome::Killed);
        assert!(world.get::<Lifecycle>(wolf).unwrap().is_corpse());
        assert!(world.resource::<PlayerSession>().minions.is_empty());
        assert_eq!(world.resource::<PlayerSession>().soul.amount(), 10);
        assert_eq!(apply_damage(&mut world, wolf, 1.0), DamageOutcome::AlreadyDead);
    }
}
