//! Public API for the simulation.
//!
//! This module provides the main interface for a host game loop (renderer,
//! minimap, animation layer) to drive the horde simulation.
//!
//! ## Tick Order
//!
//! Every tick runs one chained schedule:
//! 1. spatial index sync, group refresh (pre-tick positions)
//! 2. aggro transitions and chain propagation
//! 3. leader wandering, flocking, minion following
//! 4. movement
//! 5. contact combat, deaths, corpse expiry
//!
//! ## Fixed Timestep
//!
//! `tick(dt, player)` advances exactly one update. `step(dt, player)`
//! accumulates time and runs as many fixed updates (default 30 Hz) as fit,
//! so results do not depend on the host's frame rate.

use crate::components::*;
use crate::config::{validate_regions, RegionConfig, WorldConfig};
use crate::error::ConfigError;
use crate::groups::{group_refresh_system, AggroState, GroupId, GroupRegistry};
use crate::spatial::{spatial_sync_system, SpatialGrid};
use crate::spawner::{plan_region_groups, SpawnReport};
use crate::systems::*;
use crate::world::{entity_snapshots, group_snapshots, EntitySnapshot, GroupSnapshot, Snapshot};
use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Spawning the enemy population
/// - Stepping the simulation forward
/// - Taming corpses and applying external damage
/// - Extracting state snapshots
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    config: WorldConfig,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    spawn_reports: Vec<SpawnReport>,
    /// Host-facing ids to ECS entities. Tombstones stay mapped.
    entities: HashMap<EntityId, Entity>,
    next_entity_id: u32,
}

impl SimWorld {
    /// Create an empty simulation world from a validated configuration.
    pub fn new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut world = World::new();
        world.insert_resource(DeltaTime(config.sim.fixed_timestep));
        world.insert_resource(config.sim.clone());
        world.insert_resource(config.creatures.clone());

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                spatial_sync_system,
                group_refresh_system,
                aggro_system,
                wander_system,
                flocking_system,
                minion_follow_system,
                movement_system,
                contact_system,
                death_system,
                corpse_expiry_system,
            )
                .chain(),
        );

        let mut sim = Self {
            world,
            schedule,
            config,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
            spawn_reports: Vec::new(),
            entities: HashMap::new(),
            next_entity_id: 0,
        };
        sim.reset(0);
        Ok(sim)
    }

    /// Create a simulation world from a JSON [`WorldConfig`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::new(WorldConfig::from_json(json)?)
    }

    /// Drop all entities and per-run state; reseed the runtime RNG.
    fn reset(&mut self, seed: u64) {
        self.world.clear_entities();

        let mut runtime_rng = ChaCha8Rng::seed_from_u64(seed);
        // Separate stream so spawn and runtime draws never overlap.
        runtime_rng.set_stream(1);

        self.world.insert_resource(SimTick(0));
        self.world.insert_resource(SimRng(runtime_rng));
        self.world
            .insert_resource(SpatialGrid::<Entity>::new(self.config.creatures.max_query_radius()));
        self.world
            .insert_resource(GroupRegistry::new(self.config.sim.chain_radius));
        self.world.insert_resource(PlayerSession::new(self.config.soul));
        self.world.insert_resource(ContactLog::default());

        self.tick = 0;
        self.time = 0.0;
        self.time_accumulator = 0.0;
        self.spawn_reports.clear();
        self.entities.clear();
        self.next_entity_id = 0;
    }

    /// Spawn the enemy population of every region.
    ///
    /// Runs Poisson-disk placement per region, in the given order, from one
    /// seeded random stream; the same regions and seed always produce the
    /// same world. Calling it again starts a fresh world.
    pub fn initialize_world(&mut self, regions: &[RegionConfig], seed: u64) -> Result<Vec<GroupSnapshot>, ConfigError> {
        validate_regions(regions)?;
        self.reset(seed);

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let jitter = self.config.sim.member_jitter;
        for region in regions {
            let (plans, report) = plan_region_groups(region, jitter, &mut rng);
            let home = HomeRegion { id: region.id, bounds: region.bounds };
            for plan in &plans {
                self.spawn_members(home, plan.creature, &plan.members, region.health_multiplier());
            }
            self.spawn_reports.push(report);
        }

        let groups = group_snapshots(&self.world);
        log::info!(
            "world initialized: {} regions, {} groups, {} enemies (seed {})",
            regions.len(),
            groups.len(),
            self.entities.len(),
            seed
        );
        Ok(groups)
    }

    /// Spawn one group at explicit positions, for scripted encounters.
    pub fn spawn_group(&mut self, region_id: u32, bounds: Bounds, creature: CreatureType, positions: &[(f32, f32)]) -> GroupId {
        self.spawn_members(HomeRegion { id: region_id, bounds }, creature, positions, 1.0)
    }

    fn spawn_members(&mut self, home: HomeRegion, creature: CreatureType, positions: &[(f32, f32)], health_multiplier: f32) -> GroupId {
        let max_health = self.config.creatures.get(creature).max_health * health_multiplier;

        let mut members = Vec::with_capacity(positions.len());
        for &(x, y) in positions {
            let id = EntityId(self.next_entity_id);
            self.next_entity_id += 1;
            let entity = self
                .world
                .spawn(EnemyBundle::new(id, creature, Position::new(x, y), max_health, home))
                .id();
            self.entities.insert(id, entity);
            members.push(entity);
        }

        let n = positions.len().max(1) as f32;
        let centroid = (
            positions.iter().map(|p| p.0).sum::<f32>() / n,
            positions.iter().map(|p| p.1).sum::<f32>() / n,
        );

        let group = self
            .world
            .resource_mut::<GroupRegistry>()
            .create(home.id, creature, members.clone(), centroid);

        for (&entity, &(x, y)) in members.iter().zip(positions) {
            self.world.entity_mut(entity).insert(GroupMember(group));
            // Indexed right away so queries work before the first tick.
            self.world
                .resource_mut::<SpatialGrid>()
                .insert(entity, x, y, Faction::Wild);
        }
        group
    }

    /// Advance the simulation by exactly one update of `dt` seconds.
    pub fn tick(&mut self, dt: f32, player: Position) {
        let dt = dt.max(0.0);
        if let Some(mut session) = self.world.get_resource_mut::<PlayerSession>() {
            session.position = player;
        }
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }
        if let Some(mut tick_res) = self.world.get_resource_mut::<SimTick>() {
            tick_res.increment();
        }

        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    /// Step the simulation forward by `dt` seconds of host time.
    ///
    /// Uses fixed timestep internally. Returns the number of updates run.
    pub fn step(&mut self, dt: f32, player: Position) -> u32 {
        let fixed_dt = self.config.sim.fixed_timestep;
        self.time_accumulator += dt.max(0.0);

        let mut ticks = 0;
        while self.time_accumulator >= fixed_dt {
            self.tick(fixed_dt, player);
            self.time_accumulator -= fixed_dt;
            ticks += 1;
        }
        ticks
    }

    /// Tame the nearest corpse within `radius` of `origin`, paying soul.
    pub fn request_tame(&mut self, origin: Position, radius: f32) -> TameResult {
        self.world.resource_scope(|world, mut session: Mut<PlayerSession>| {
            crate::systems::tame::request_tame(world, &mut session, origin, radius)
        })
    }

    /// Apply damage from the host's own damage resolution.
    ///
    /// Returns `None` for unknown ids.
    pub fn damage_entity(&mut self, id: EntityId, amount: f32) -> Option<DamageOutcome> {
        let entity = *self.entities.get(&id)?;
        Some(apply_damage(&mut self.world, entity, amount))
    }

    /// Take every player contact recorded since the last call.
    pub fn drain_player_contacts(&mut self) -> Vec<PlayerContact> {
        self.world
            .get_resource_mut::<ContactLog>()
            .map(|mut log| std::mem::take(&mut log.0))
            .unwrap_or_default()
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        Snapshot::from_world(&mut self.world, self.tick, self.time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// All entities still in play, sorted by id.
    pub fn entity_snapshots(&mut self) -> Vec<EntitySnapshot> {
        entity_snapshots(&mut self.world)
    }

    /// All groups, in id order.
    pub fn group_snapshots(&self) -> Vec<GroupSnapshot> {
        group_snapshots(&self.world)
    }

    /// Current soul meter reading.
    pub fn soul_meter(&self) -> SoulSummary {
        self.world
            .get_resource::<PlayerSession>()
            .map(|s| SoulSummary::from(&s.soul))
            .unwrap_or(SoulSummary { amount: 0, max: self.config.soul.max })
    }

    /// Minion ids in taming order.
    pub fn minions(&self) -> Vec<EntityId> {
        self.world
            .get_resource::<PlayerSession>()
            .map(|s| s.minions.clone())
            .unwrap_or_default()
    }

    /// Lifecycle of an entity, including removed tombstones.
    pub fn lifecycle(&self, id: EntityId) -> Option<Lifecycle> {
        let entity = *self.entities.get(&id)?;
        self.world.get::<Lifecycle>(entity).copied()
    }

    pub fn group_state(&self, id: GroupId) -> Option<AggroState> {
        self.world
            .get_resource::<GroupRegistry>()
            .and_then(|r| r.get(id))
            .map(|g| g.state)
    }

    /// Ids of a group's members, living and dead.
    pub fn group_members(&self, id: GroupId) -> Vec<EntityId> {
        self.world
            .get_resource::<GroupRegistry>()
            .and_then(|r| r.get(id))
            .map(|g| {
                g.members
                    .iter()
                    .filter_map(|&m| self.world.get::<EntityId>(m).copied())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Per-region statistics from the last `initialize_world`.
    pub fn spawn_reports(&self) -> &[SpawnReport] {
        &self.spawn_reports
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    /// Get the spatial grid reference (for debugging/visualization).
    pub fn spatial_grid(&self) -> Option<&SpatialGrid> {
        self.world.get_resource::<SpatialGrid>()
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        match Self::new(WorldConfig::default()) {
            Ok(sim) => sim,
            Err(err) => unreachable!("built-in configuration failed validation: {err}"),
        }
    }
}
