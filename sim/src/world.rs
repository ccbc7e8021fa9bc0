//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable, read-only view of the
//! simulation state for renderers, minimaps and animation layers.

use crate::components::*;
use crate::groups::{AggroState, AggroTarget, EnemyGroup, GroupRegistry};
use crate::systems::tame::{PlayerSession, SoulSummary};
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single entity's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub heading: f32,
    pub faction: Faction,
    pub creature: CreatureType,
    pub health: f32,
    pub health_max: f32,
    pub lifecycle: Lifecycle,
    /// Group id, absent for minions and ungrouped corpses.
    pub group: Option<u32>,
}

/// What a group is chasing, by entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetSnapshot {
    Player,
    Minion(u32),
}

/// Snapshot of one enemy group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub id: u32,
    pub region: u32,
    pub creature: CreatureType,
    pub state: AggroState,
    pub leader: Option<u32>,
    pub members: Vec<u32>,
    pub target: Option<TargetSnapshot>,
    pub wander_target: Option<(f32, f32)>,
    pub centroid: (f32, f32),
}

impl GroupSnapshot {
    pub fn from_group(world: &World, group: &EnemyGroup) -> Self {
        let id_of = |e: Entity| world.get::<EntityId>(e).map(|id| id.0);
        Self {
            id: group.id.0,
            region: group.region,
            creature: group.creature,
            state: group.state,
            leader: id_of(group.leader),
            members: group.members.iter().filter_map(|&m| id_of(m)).collect(),
            target: group.target.and_then(|t| match t {
                AggroTarget::Player => Some(TargetSnapshot::Player),
                AggroTarget::Minion(e) => id_of(e).map(TargetSnapshot::Minion),
            }),
            wander_target: group.wander_target,
            centroid: group.centroid,
        }
    }
}

/// Snapshot every group, in id order.
pub fn group_snapshots(world: &World) -> Vec<GroupSnapshot> {
    world
        .get_resource::<GroupRegistry>()
        .map(|registry| {
            registry
                .iter()
                .map(|group| GroupSnapshot::from_group(world, group))
                .collect()
        })
        .unwrap_or_default()
}

/// Snapshot every entity still in play (alive or corpse), sorted by id.
pub fn entity_snapshots(world: &mut World) -> Vec<EntitySnapshot> {
    let mut query = world.query::<(
        &EntityId,
        &Position,
        &Velocity,
        &Heading,
        &Faction,
        &CreatureType,
        &Health,
        &Lifecycle,
        Option<&GroupMember>,
    )>();

    let mut entities: Vec<EntitySnapshot> = query
        .iter(world)
        .filter(|(.., lifecycle, _)| **lifecycle != Lifecycle::Removed)
        .map(|(id, pos, vel, heading, faction, creature, health, lifecycle, member)| EntitySnapshot {
            id: id.0,
            x: pos.x,
            y: pos.y,
            vx: vel.vx,
            vy: vel.vy,
            heading: heading.0,
            faction: *faction,
            creature: *creature,
            health: health.current,
            health_max: health.max,
            lifecycle: *lifecycle,
            group: member.map(|m| m.0 .0),
        })
        .collect();
    entities.sort_by_key(|e| e.id);
    entities
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    pub entities: Vec<EntitySnapshot>,
    pub groups: Vec<GroupSnapshot>,
    pub soul: SoulSummary,
    /// Minion ids in taming order.
    pub minions: Vec<u32>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let entities = entity_snapshots(world);
        let groups = group_snapshots(world);
        let (soul, minions) = world
            .get_resource::<PlayerSession>()
            .map(|s| (SoulSummary::from(&s.soul), s.minions.iter().map(|m| m.0).collect()))
            .unwrap_or((SoulSummary { amount: 0, max: 0 }, Vec::new()));

        Self {
            tick,
            time,
            entities,
            groups,
            soul,
            minions,
        }
    }

    /// Serialize snapshot to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize snapshot to pretty JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::GroupId;

    fn spawn(world: &mut World, id: u32, x: f32, lifecycle: Lifecycle) -> Entity {
        world
            .spawn((
                EntityId(id),
                Position::new(x, 0.0),
                Velocity::ZERO,
                Heading::default(),
                Faction::Wild,
                CreatureType::Wolf,
                Health::new(35.0),
                lifecycle,
            ))
            .id()
    }

    #[test]
    fn test_entity_snapshots_skip_tombstones_and_sort_by_id() {
        let mut world = World::new();
        spawn(&mut world, 3, 3.0, Lifecycle::Alive);
        spawn(&mut world, 1, 1.0, Lifecycle::Corpse { expires_at: 9 });
        spawn(&mut world, 2, 2.0, Lifecycle::Removed);

        let ids: Vec<u32> = entity_snapshots(&mut world).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_group_snapshot_resolves_entity_ids() {
        let mut world = World::new();
        let a = spawn(&mut world, 10, 0.0, Lifecycle::Alive);
        let b = spawn(&mut world, 11, 2.0, Lifecycle::Alive);
        let mut registry = GroupRegistry::new(10.0);
        let id = registry.create(4, CreatureType::Wolf, vec![a, b], (1.0, 0.0));
        if let Some(group) = registry.get_mut(id) {
            group.state = AggroState::Aggro;
            group.target = Some(AggroTarget::Player);
        }
        world.insert_resource(registry);
        world.entity_mut(b).insert(GroupMember(GroupId(0)));

        let groups = group_snapshots(&world);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].leader, Some(10));
        assert_eq!(groups[0].members, vec![10, 11]);
        assert_eq!(groups[0].target, Some(TargetSnapshot::Player));

        let snapshot = Snapshot::from_world(&mut world, 7, 0.25);
        assert_eq!(snapshot.entities[1].group, Some(0));
        assert_eq!(snapshot.entities[0].group, None);
        assert!(snapshot.to_json().unwrap().contains("\"Aggro\""));
    }
}
