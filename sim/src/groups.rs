//! Enemy groups.
//!
//! Groups live in an arena resource keyed by [`GroupId`]. They hold member
//! entity ids rather than references, and the leader is one of those ids, so
//! a dead leader is just an id that no longer resolves to a living entity.

use crate::components::{CreatureType, Faction, GroupMember, Lifecycle, Position, Velocity};
use crate::spatial::SpatialGrid;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of an enemy group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

/// Group-level aggro state. Every member shares it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggroState {
    #[default]
    Idle,
    Aggro,
}

/// What an aggroed group is chasing. Minion targets are weak references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggroTarget {
    Player,
    Minion(Entity),
}

/// A set of enemies sharing a leader, faction, creature type and aggro state.
#[derive(Debug, Clone)]
pub struct EnemyGroup {
    pub id: GroupId,
    /// Region the group spawned in.
    pub region: u32,
    pub creature: CreatureType,
    pub faction: Faction,
    pub leader: Entity,
    /// Living members and corpses not yet removed.
    pub members: Vec<Entity>,
    pub state: AggroState,
    pub target: Option<AggroTarget>,
    /// Point the leader walks toward. Only meaningful while Idle.
    pub wander_target: Option<(f32, f32)>,
    /// Seconds until the leader picks a new wander point.
    pub wander_timer: f32,
    /// Seconds the group is still held in Aggro regardless of distance.
    pub aggro_lock: f32,
    /// Centroid of living members at the start of the tick.
    pub centroid: (f32, f32),
    /// Mean velocity of living members at the start of the tick.
    pub mean_velocity: Velocity,
    pub alive_count: usize,
}

impl EnemyGroup {
    pub fn is_aggro(&self) -> bool {
        self.state == AggroState::Aggro
    }

    pub fn centroid_position(&self) -> Position {
        Position::from(self.centroid)
    }
}

/// Outcome of detaching one member from its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    /// Removed; the group lives on under `leader`.
    Removed { leader: Entity },
    /// It was the last member and the group is gone.
    Dissolved,
    /// Unknown group or not a member.
    NotMember,
}

/// Arena of all enemy groups plus a grid of their centroids.
#[derive(Resource, Debug, Clone)]
pub struct GroupRegistry {
    groups: BTreeMap<GroupId, EnemyGroup>,
    next_id: u32,
    centroids: SpatialGrid<GroupId>,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl GroupRegistry {
    /// `chain_radius` sizes the centroid grid cells.
    pub fn new(chain_radius: f32) -> Self {
        Self {
            groups: BTreeMap::new(),
            next_id: 0,
            centroids: SpatialGrid::new(chain_radius),
        }
    }

    /// Register a group. The first member becomes the leader.
    pub fn create(&mut self, region: u32, creature: CreatureType, members: Vec<Entity>, centroid: (f32, f32)) -> GroupId {
        let id = GroupId(self.next_id);
        self.next_id += 1;

        let group = EnemyGroup {
            id,
            region,
            creature,
            faction: Faction::Wild,
            leader: members.first().copied().unwrap_or(Entity::PLACEHOLDER),
            alive_count: members.len(),
            members,
            state: AggroState::Idle,
            target: None,
            wander_target: None,
            wander_timer: 0.0,
            aggro_lock: 0.0,
            centroid,
            mean_velocity: Velocity::ZERO,
        };
        self.centroids.insert(id, centroid.0, centroid.1, group.faction);
        self.groups.insert(id, group);
        id
    }

    pub fn get(&self, id: GroupId) -> Option<&EnemyGroup> {
        self.groups.get(&id)
    }

    pub fn get_mut(&mut self, id: GroupId) -> Option<&mut EnemyGroup> {
        self.groups.get_mut(&id)
    }

    /// Groups in id order.
    pub fn iter(&self) -> impl Iterator<Item = &EnemyGroup> {
        self.groups.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EnemyGroup> {
        self.groups.values_mut()
    }

    pub fn ids(&self) -> Vec<GroupId> {
        self.groups.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Groups whose centroid lies within `radius` of a point, nearest first.
    pub fn groups_near(&self, x: f32, y: f32, radius: f32) -> Vec<GroupId> {
        self.centroids.query_ids(x, y, radius)
    }

    pub fn centroid_grid(&self) -> &SpatialGrid<GroupId> {
        &self.centroids
    }

    fn set_centroid(&mut self, id: GroupId, centroid: (f32, f32)) {
        if let Some(group) = self.groups.get_mut(&id) {
            group.centroid = centroid;
            self.centroids.update(id, centroid.0, centroid.1);
        }
    }

    /// Remove a group entirely.
    pub fn dissolve(&mut self, id: GroupId) -> Option<EnemyGroup> {
        self.centroids.remove(id);
        self.groups.remove(&id)
    }

    /// Take `entity` out of group `id`.
    ///
    /// A departing leader is replaced by the first remaining member that
    /// `is_alive` accepts, or by the first remaining member at all.
    pub fn detach_member(&mut self, id: GroupId, entity: Entity, is_alive: impl Fn(Entity) -> bool) -> Detach {
        let Some(group) = self.groups.get_mut(&id) else {
            return Detach::NotMember;
        };
        let Some(index) = group.members.iter().position(|&m| m == entity) else {
            return Detach::NotMember;
        };
        group.members.remove(index);

        if group.members.is_empty() {
            self.dissolve(id);
            log::debug!("group {:?} dissolved: last member detached", id);
            return Detach::Dissolved;
        }

        if group.leader == entity {
            let next = group
                .members
                .iter()
                .copied()
                .find(|&m| is_alive(m))
                .unwrap_or(group.members[0]);
            group.leader = next;
            log::debug!("group {:?}: leader detached, promoted {:?}", id, next);
        }
        Detach::Removed { leader: group.leader }
    }
}

/// System that refreshes per-group aggregates from the members' current state.
///
/// Drops removed members, recomputes centroid and mean velocity over living
/// members, promotes a new leader when the old one is no longer alive and
/// dissolves groups with nobody left alive.
pub fn group_refresh_system(
    mut commands: Commands,
    mut registry: ResMut<GroupRegistry>,
    members: Query<(&Position, &Velocity, &Lifecycle)>,
) {
    for id in registry.ids() {
        let Some(group) = registry.get_mut(id) else {
            continue;
        };

        group.members.retain(|&m| {
            members
                .get(m)
                .map(|(_, _, lifecycle)| *lifecycle != Lifecycle::Removed)
                .unwrap_or(false)
        });

        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_v = Velocity::ZERO;
        let mut first_alive = None;
        let mut leader_alive = false;
        let mut count = 0usize;

        for &m in &group.members {
            let Ok((pos, vel, lifecycle)) = members.get(m) else {
                continue;
            };
            if !lifecycle.is_alive() {
                continue;
            }
            first_alive.get_or_insert(m);
            leader_alive |= m == group.leader;
            sum_x += pos.x;
            sum_y += pos.y;
            sum_v = sum_v.plus(*vel);
            count += 1;
        }

        let Some(first_alive) = first_alive else {
            for &corpse in &group.members {
                commands.entity(corpse).remove::<GroupMember>();
            }
            registry.dissolve(id);
            log::debug!("group {:?} dissolved: no living members", id);
            continue;
        };

        if !leader_alive {
            log::debug!("group {:?}: leader {:?} lost, promoted {:?}", id, group.leader, first_alive);
            group.leader = first_alive;
        }

        let n = count as f32;
        group.alive_count = count;
        group.mean_velocity = sum_v.scaled(1.0 / n);
        let centroid = (sum_x / n, sum_y / n);
        registry.set_centroid(id, centroid);
    }
}
