//! Group aggro state machine.
//!
//! Each group is evaluated once per tick from its centroid. Entering Aggro
//! uses the creature's aggro radius, leaving it the larger deaggro radius, so
//! a target hovering near the boundary cannot make the group flap. A group
//! that turns hostile pulls nearby idle groups of its own creature type
//! along, breadth-first.

use crate::components::*;
use crate::config::{CreatureProfile, CreatureTable, SimConfig};
use crate::groups::{AggroState, AggroTarget, EnemyGroup, GroupId, GroupRegistry};
use crate::spatial::SpatialGrid;
use crate::systems::movement::DeltaTime;
use crate::systems::tame::PlayerSession;
use bevy_ecs::prelude::*;
use std::collections::VecDeque;

/// Next state for a group at `distance` from its target.
///
/// `locked` holds an aggroed group in place regardless of distance.
pub fn evaluate_transition(state: AggroState, distance: f32, profile: &CreatureProfile, locked: bool) -> AggroState {
    match state {
        AggroState::Idle if distance < profile.aggro_radius => AggroState::Aggro,
        AggroState::Aggro if distance > profile.deaggro_radius && !locked => AggroState::Idle,
        other => other,
    }
}

/// Position of a target, or `None` once it no longer exists or is no longer alive.
pub fn resolve_target(
    target: AggroTarget,
    player: Position,
    minions: &Query<(&Position, &Lifecycle), With<Minion>>,
) -> Option<Position> {
    match target {
        AggroTarget::Player => Some(player),
        AggroTarget::Minion(entity) => match minions.get(entity) {
            Ok((pos, lifecycle)) if lifecycle.is_alive() => Some(*pos),
            _ => None,
        },
    }
}

/// Nearest target strictly inside the aggro radius of a group centroid.
fn nearest_candidate(
    group: &EnemyGroup,
    profile: &CreatureProfile,
    player: Position,
    grid: &SpatialGrid,
    minions: &Query<(&Position, &Lifecycle), With<Minion>>,
) -> Option<(AggroTarget, f32)> {
    let centroid = group.centroid_position();
    let mut best = Some((AggroTarget::Player, centroid.distance_to(&player)))
        .filter(|&(_, d)| d < profile.aggro_radius);

    let minion = grid
        .query_attackable(centroid.x, centroid.y, profile.aggro_radius, group.faction)
        .into_iter()
        .find(|entry| resolve_target(AggroTarget::Minion(entry.id), player, minions).is_some())
        .map(|entry| (AggroTarget::Minion(entry.id), centroid.distance_to(&Position::new(entry.x, entry.y))))
        .filter(|&(_, d)| d < profile.aggro_radius);

    if let Some((target, d)) = minion {
        if best.map_or(true, |(_, best_d)| d < best_d) {
            best = Some((target, d));
        }
    }
    best
}

fn enter_aggro(group: &mut EnemyGroup, target: AggroTarget, lock_secs: f32) {
    group.state = AggroState::Aggro;
    group.target = Some(target);
    group.aggro_lock = lock_secs;
    group.wander_target = None;
}

fn exit_aggro(group: &mut EnemyGroup) {
    group.state = AggroState::Idle;
    group.target = None;
    group.aggro_lock = 0.0;
    // Pick a fresh wander point on the next wander pass.
    group.wander_timer = 0.0;
}

/// System that updates every group's aggro state, then runs chain propagation.
///
/// ## Data Access
/// - Reads: DeltaTime, SimConfig, CreatureTable, PlayerSession, SpatialGrid, minion positions
/// - Writes: GroupRegistry
pub fn aggro_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    creatures: Res<CreatureTable>,
    session: Res<PlayerSession>,
    grid: Res<SpatialGrid>,
    mut registry: ResMut<GroupRegistry>,
    minions: Query<(&Position, &Lifecycle), With<Minion>>,
) {
    let delta = dt.0;
    let player = session.position;
    let mut newly_aggro = VecDeque::new();

    for group in registry.iter_mut() {
        let profile = creatures.get(group.creature);
        group.aggro_lock = (group.aggro_lock - delta).max(0.0);

        match group.state {
            AggroState::Idle => {
                if let Some((target, distance)) = nearest_candidate(group, profile, player, &grid, &minions) {
                    if evaluate_transition(AggroState::Idle, distance, profile, false) == AggroState::Aggro {
                        enter_aggro(group, target, config.aggro_lock_secs);
                        newly_aggro.push_back(group.id);
                        log::debug!("group {:?} aggro on {:?} at {:.1}", group.id, target, distance);
                    }
                }
            }
            AggroState::Aggro => {
                let current = group.target.and_then(|t| resolve_target(t, player, &minions));
                let keep = current.map_or(false, |pos| {
                    let distance = group.centroid_position().distance_to(&pos);
                    evaluate_transition(AggroState::Aggro, distance, profile, group.aggro_lock > 0.0)
                        == AggroState::Aggro
                });
                if keep {
                    continue;
                }

                match nearest_candidate(group, profile, player, &grid, &minions) {
                    Some((target, _)) => group.target = Some(target),
                    None => {
                        exit_aggro(group);
                        log::debug!("group {:?} back to idle", group.id);
                    }
                }
            }
        }
    }

    propagate_aggro(&mut registry, newly_aggro, config.chain_radius, config.aggro_lock_secs);
}

/// Breadth-first spread of aggro to idle same-type groups whose centroids lie
/// within `chain_radius` of an aggroed group's centroid.
///
/// Groups already in Aggro are never queued again, so a pass always terminates.
pub fn propagate_aggro(registry: &mut GroupRegistry, mut queue: VecDeque<GroupId>, chain_radius: f32, lock_secs: f32) {
    while let Some(source) = queue.pop_front() {
        let Some(group) = registry.get(source) else {
            continue;
        };
        let (creature, centroid) = (group.creature, group.centroid);
        let Some(target) = group.target else {
            continue;
        };

        for other in registry.groups_near(centroid.0, centroid.1, chain_radius) {
            let Some(neighbor) = registry.get_mut(other) else {
                continue;
            };
            if neighbor.creature != creature || neighbor.state == AggroState::Aggro {
                continue;
            }
            enter_aggro(neighbor, target, lock_secs);
            queue.push_back(other);
            log::debug!("group {:?} joined aggro of {:?}", other, source);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::group_refresh_system;
    use crate::spatial::spatial_sync_system;

    fn test_world(player: Position) -> World {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));
        world.insert_resource(SimConfig::default());
        world.insert_resource(CreatureTable::default());
        world.insert_resource(SpatialGrid::<Entity>::new(12.0));
        world.insert_resource(GroupRegistry::new(10.0));
        let mut session = PlayerSession::default();
        session.position = player;
        world.insert_resource(session);
        world
    }

    fn spawn_group(world: &mut World, creature: CreatureType, x: f32, y: f32) -> GroupId {
        let e = world
            .spawn((Position::new(x, y), Velocity::ZERO, Faction::Wild, Lifecycle::Alive))
            .id();
        world
            .resource_mut::<GroupRegistry>()
            .create(1, creature, vec![e], (x, y))
    }

    fn schedule() -> Schedule {
        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_sync_system, group_refresh_system, aggro_system).chain());
        schedule
    }

    fn state(world: &World, id: GroupId) -> AggroState {
        world.resource::<GroupRegistry>().get(id).unwrap().state
    }

    #[test]
    fn test_hysteresis_thresholds() {
        let slime = CreatureProfile::slime();
        assert_eq!(evaluate_transition(AggroState::Idle, 7.9, &slime, false), AggroState::Aggro);
        assert_eq!(evaluate_transition(AggroState::Idle, 8.0, &slime, false), AggroState::Idle);
        assert_eq!(evaluate_transition(AggroState::Idle, 10.0, &slime, false), AggroState::Idle);
        // Between the radii an aggroed group keeps chasing.
        assert_eq!(evaluate_transition(AggroState::Aggro, 10.0, &slime, false), AggroState::Aggro);
        assert_eq!(evaluate_transition(AggroState::Aggro, 12.0, &slime, false), AggroState::Aggro);
        assert_eq!(evaluate_transition(AggroState::Aggro, 12.1, &slime, false), AggroState::Idle);
        assert_eq!(evaluate_transition(AggroState::Aggro, 50.0, &slime, true), AggroState::Aggro);
    }

    #[test]
    fn test_propagation_follows_creature_type() {
        let mut world = test_world(Position::new(-7.0, 0.0));
        let a = spawn_group(&mut world, CreatureType::Slime, 0.0, 0.0);
        let b = spawn_group(&mut world, CreatureType::Slime, 9.0, 0.0);
        let chained = spawn_group(&mut world, CreatureType::Slime, 18.0, 0.0);
        let far = spawn_group(&mut world, CreatureType::Slime, 40.0, 0.0);
        let ogre = spawn_group(&mut world, CreatureType::Ogre, 3.0, 8.0);

        schedule().run(&mut world);

        assert_eq!(state(&world, a), AggroState::Aggro);
        assert_eq!(state(&world, b), AggroState::Aggro);
        assert_eq!(state(&world, chained), AggroState::Aggro);
        assert_eq!(state(&world, far), AggroState::Idle);
        assert_eq!(state(&world, ogre), AggroState::Idle);

        let registry = world.resource::<GroupRegistry>();
        assert_eq!(registry.get(chained).unwrap().target, Some(AggroTarget::Player));
    }

    #[test]
    fn test_deaggro_waits_for_lock() {
        let mut world = test_world(Position::new(5.0, 0.0));
        let g = spawn_group(&mut world, CreatureType::Slime, 0.0, 0.0);
        let mut schedule = schedule();
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Aggro);

        world.resource_mut::<PlayerSession>().position = Position::new(100.0, 0.0);
        schedule.run(&mut world);
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Aggro);

        schedule.run(&mut world);
        let registry = world.resource::<GroupRegistry>();
        let group = registry.get(g).unwrap();
        assert_eq!(group.state, AggroState::Idle);
        assert_eq!(group.target, None);
        assert_eq!(group.wander_timer, 0.0);
    }

    #[test]
    fn test_without_lock_deaggro_is_immediate() {
        let mut world = test_world(Position::new(5.0, 0.0));
        world.insert_resource(SimConfig { aggro_lock_secs: 0.0, ..Default::default() });
        let g = spawn_group(&mut world, CreatureType::Slime, 0.0, 0.0);
        let mut schedule = schedule();
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Aggro);

        // Inside the deaggro radius the chase goes on.
        world.resource_mut::<PlayerSession>().position = Position::new(12.0, 0.0);
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Aggro);

        world.resource_mut::<PlayerSession>().position = Position::new(12.5, 0.0);
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Idle);
    }

    #[test]
    fn test_minion_target_is_dropped_when_it_dies() {
        let mut world = test_world(Position::new(500.0, 500.0));
        let g = spawn_group(&mut world, CreatureType::Wolf, 0.0, 0.0);
        let minion = world
            .spawn((Position::new(3.0, 0.0), Velocity::ZERO, Faction::Player, Lifecycle::Alive, Minion))
            .id();

        let mut schedule = schedule();
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Aggro);
        assert_eq!(
            world.resource::<GroupRegistry>().get(g).unwrap().target,
            Some(AggroTarget::Minion(minion))
        );

        *world.get_mut::<Lifecycle>(minion).unwrap() = Lifecycle::Corpse { expires_at: 50 };
        schedule.run(&mut world);
        assert_eq!(state(&world, g), AggroState::Idle);
    }

    #[test]
    fn test_propagation_does_not_requeue_aggroed_groups() {
        let mut registry = GroupRegistry::new(10.0);
        let ids: Vec<GroupId> = (0..5)
            .map(|i| registry.create(1, CreatureType::Wolf, vec![Entity::from_raw(i)], (i as f32 * 2.0, 0.0)))
            .collect();
        if let Some(first) = registry.get_mut(ids[0]) {
            enter_aggro(first, AggroTarget::Player, 3.0);
        }

        propagate_aggro(&mut registry, VecDeque::from([ids[0]]), 10.0, 3.0);
        assert!(registry.iter().all(EnemyGroup::is_aggro));
    }
}
