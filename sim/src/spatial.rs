//! Spatial partitioning for efficient neighbor queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entries in nearby cells, rather than O(n) for brute force.
//!
//! The grid is generic over its key so the same structure backs the per-tick
//! entity index (`SpatialGrid<Entity>`), Poisson-disk sampling
//! (`SpatialGrid<usize>`) and the group centroid index (`SpatialGrid<GroupId>`).
//! Relocation is incremental: moving an entry touches at most two cells.

use crate::components::{Faction, Lifecycle, Position};
use crate::systems::faction::may_attack;
use bevy_ecs::prelude::*;
use std::collections::HashMap;
use std::hash::Hash;

/// Grid-based spatial partitioning structure.
///
/// Divides the world into square cells and tracks which keys are in each cell.
/// Not safe for concurrent writers; concurrent readers are fine.
#[derive(Debug, Clone)]
pub struct SpatialGrid<K = Entity> {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to the entries in that cell.
    cells: HashMap<(i32, i32), Vec<SpatialEntry<K>>>,
    /// Reverse lookup: key to cell.
    key_cells: HashMap<K, (i32, i32)>,
}

impl<K> Resource for SpatialGrid<K> where K: Send + Sync + 'static {}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry<K = Entity> {
    pub id: K,
    pub x: f32,
    pub y: f32,
    pub faction: Faction,
}

impl<K> SpatialEntry<K> {
    #[inline]
    fn distance_sq(&self, x: f32, y: f32) -> f32 {
        (self.x - x).powi(2) + (self.y - y).powi(2)
    }
}

impl<K: Copy + Eq + Hash> Default for SpatialGrid<K> {
    fn default() -> Self {
        Self::new(20.0) // 20 unit cells by default
    }
}

impl<K: Copy + Eq + Hash> SpatialGrid<K> {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
            key_cells: HashMap::new(),
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.key_cells.clear();
    }

    /// Insert a key at a position, or move it there if already present.
    pub fn insert(&mut self, id: K, x: f32, y: f32, faction: Faction) {
        let cell = self.world_to_cell(x, y);
        let entry = SpatialEntry { id, x, y, faction };

        match self.key_cells.get(&id).copied() {
            Some(old_cell) if old_cell == cell => {
                if let Some(slot) = self
                    .cells
                    .get_mut(&cell)
                    .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
                {
                    *slot = entry;
                    return;
                }
            }
            Some(old_cell) => self.detach(id, old_cell),
            None => {}
        }

        self.cells.entry(cell).or_default().push(entry);
        self.key_cells.insert(id, cell);
    }

    /// Move a known key, keeping its faction. Returns `false` for unknown keys.
    pub fn update(&mut self, id: K, x: f32, y: f32) -> bool {
        match self.get(id) {
            Some(entry) => {
                self.insert(id, x, y, entry.faction);
                true
            }
            None => false,
        }
    }

    /// Change the faction stored for a key. Returns `false` for unknown keys.
    pub fn set_faction(&mut self, id: K, faction: Faction) -> bool {
        let Some(cell) = self.key_cells.get(&id) else {
            return false;
        };
        match self
            .cells
            .get_mut(cell)
            .and_then(|entries| entries.iter_mut().find(|e| e.id == id))
        {
            Some(entry) => {
                entry.faction = faction;
                true
            }
            None => false,
        }
    }

    /// Remove a key from the grid.
    pub fn remove(&mut self, id: K) {
        if let Some(cell) = self.key_cells.remove(&id) {
            self.detach(id, cell);
        }
    }

    fn detach(&mut self, id: K, cell: (i32, i32)) {
        if let Some(entries) = self.cells.get_mut(&cell) {
            if let Some(index) = entries.iter().position(|e| e.id == id) {
                entries.swap_remove(index);
            }
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    pub fn contains(&self, id: K) -> bool {
        self.key_cells.contains_key(&id)
    }

    /// Current entry for a key.
    pub fn get(&self, id: K) -> Option<SpatialEntry<K>> {
        let cell = self.key_cells.get(&id)?;
        self.cells.get(cell)?.iter().find(|e| e.id == id).copied()
    }

    /// Visit every entry in the cells that can hold points within `radius`.
    ///
    /// Negative and NaN radii visit nothing. When the cell rectangle covering
    /// the radius is larger than the occupied set, the occupied cells are
    /// walked instead, in the same x-major order.
    fn for_each_candidate(&self, x: f32, y: f32, radius: f32, mut visit: impl FnMut(&SpatialEntry<K>) -> bool) {
        if !(radius >= 0.0) {
            return;
        }
        let (cx, cy) = self.world_to_cell(x, y);
        let reach = (radius / self.cell_size).ceil();
        let span = 2.0 * f64::from(reach) + 1.0;

        if !reach.is_finite() || span * span > self.cells.len() as f64 {
            let mut occupied: Vec<&(i32, i32)> = self.cells.keys().collect();
            occupied.sort_unstable();
            for cell in occupied {
                for entry in &self.cells[cell] {
                    if !visit(entry) {
                        return;
                    }
                }
            }
            return;
        }

        let reach = reach as i32;
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                let cell = (cx.saturating_add(dx), cy.saturating_add(dy));
                if let Some(entries) = self.cells.get(&cell) {
                    for entry in entries {
                        if !visit(entry) {
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Query all entries within a radius of a point (inclusive).
    /// Returns entries sorted by distance (closest first).
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry<K>> {
        let radius_sq = radius * radius;
        let mut results = Vec::new();

        self.for_each_candidate(x, y, radius, |entry| {
            if entry.distance_sq(x, y) <= radius_sq {
                results.push(*entry);
            }
            true
        });

        // Stable sort keeps cell order for equal distances.
        results.sort_by(|a, b| {
            a.distance_sq(x, y)
                .partial_cmp(&b.distance_sq(x, y))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        results
    }

    /// Keys within a radius of a point, closest first.
    pub fn query_ids(&self, x: f32, y: f32, radius: f32) -> Vec<K> {
        self.query_radius(x, y, radius).into_iter().map(|e| e.id).collect()
    }

    /// Whether any entry lies strictly closer than `radius`. Stops at the first hit.
    pub fn any_closer_than(&self, x: f32, y: f32, radius: f32) -> bool {
        let radius_sq = radius * radius;
        let mut found = false;
        self.for_each_candidate(x, y, radius, |entry| {
            found = entry.distance_sq(x, y) < radius_sq;
            !found
        });
        found
    }

    /// Query entries of one faction within a radius.
    pub fn query_faction(&self, x: f32, y: f32, radius: f32, faction: Faction) -> Vec<SpatialEntry<K>> {
        let mut results = self.query_radius(x, y, radius);
        results.retain(|e| e.faction == faction);
        results
    }

    /// Query entries an attacker of `attacker` faction is allowed to strike.
    pub fn query_attackable(&self, x: f32, y: f32, radius: f32, attacker: Faction) -> Vec<SpatialEntry<K>> {
        let mut results = self.query_radius(x, y, radius);
        results.retain(|e| may_attack(attacker, e.faction));
        results
    }

    /// Get count of entries in a cell.
    pub fn cell_count(&self, cell: (i32, i32)) -> usize {
        self.cells.get(&cell).map(|v| v.len()).unwrap_or(0)
    }

    /// Get total entry count.
    pub fn total_count(&self) -> usize {
        self.key_cells.len()
    }

    /// Get all cells (for debugging/visualization).
    pub fn all_cells(&self) -> impl Iterator<Item = (&(i32, i32), &Vec<SpatialEntry<K>>)> {
        self.cells.iter()
    }
}

/// System that brings the entity grid up to date with entities that moved,
/// switched faction or changed lifecycle since the last run.
///
/// Untouched entities cost nothing; there is no per-tick rebuild.
pub fn spatial_sync_system(
    mut grid: ResMut<SpatialGrid>,
    changed: Query<
        (Entity, &Position, &Faction, &Lifecycle),
        Or<(Changed<Position>, Changed<Faction>, Changed<Lifecycle>)>,
    >,
) {
    for (entity, pos, faction, lifecycle) in changed.iter() {
        if matches!(lifecycle, Lifecycle::Removed) {
            grid.remove(entity);
        } else {
            grid.insert(entity, pos.x, pos.y, *faction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_spatial_grid_insert_query() {
        let mut grid = SpatialGrid::new(10.0);

        let e1 = Entity::from_raw(1);
        let e2 = Entity::from_raw(2);
        let e3 = Entity::from_raw(3);

        grid.insert(e1, 5.0, 5.0, Faction::Wild);
        grid.insert(e2, 15.0, 5.0, Faction::Wild);
        grid.insert(e3, 100.0, 100.0, Faction::Player);

        // Query around e1
        let nearby = grid.query_radius(5.0, 5.0, 15.0);
        assert_eq!(nearby.len(), 2); // e1 and e2
        assert_eq!(nearby[0].id, e1);

        // Query with smaller radius
        let nearby = grid.query_radius(5.0, 5.0, 5.0);
        assert_eq!(nearby.len(), 1); // just e1

        // Query far away
        let nearby = grid.query_ids(100.0, 100.0, 10.0);
        assert_eq!(nearby, vec![e3]);
    }

    #[test]
    fn test_update_moves_between_cells() {
        let mut grid = SpatialGrid::new(10.0);
        let e = Entity::from_raw(7);

        grid.insert(e, 1.0, 1.0, Faction::Wild);
        assert_eq!(grid.cell_count((0, 0)), 1);

        assert!(grid.update(e, 25.0, 1.0));
        assert_eq!(grid.cell_count((0, 0)), 0);
        assert_eq!(grid.cell_count((2, 0)), 1);
        assert_eq!(grid.total_count(), 1);
        assert!(grid.query_radius(1.0, 1.0, 2.0).is_empty());

        // Same-cell moves rewrite the entry in place.
        assert!(grid.update(e, 26.0, 2.0));
        assert_eq!(grid.cell_count((2, 0)), 1);
        assert_eq!(grid.get(e).map(|entry| entry.x), Some(26.0));

        assert!(!grid.update(Entity::from_raw(99), 0.0, 0.0));
    }

    #[test]
    fn test_remove_and_set_faction() {
        let mut grid = SpatialGrid::new(4.0);
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);

        grid.insert(a, 0.0, 0.0, Faction::Wild);
        grid.insert(b, 1.0, 0.0, Faction::Wild);

        assert!(grid.set_faction(b, Faction::Player));
        assert_eq!(grid.query_faction(0.0, 0.0, 5.0, Faction::Player).len(), 1);

        grid.remove(a);
        assert!(!grid.contains(a));
        assert_eq!(grid.query_ids(0.0, 0.0, 5.0), vec![b]);
    }

    #[test]
    fn test_attackable_query_respects_factions() {
        let mut grid = SpatialGrid::new(10.0);
        let wild = Entity::from_raw(1);
        let other_wild = Entity::from_raw(2);
        let minion = Entity::from_raw(3);

        grid.insert(wild, 0.0, 0.0, Faction::Wild);
        grid.insert(other_wild, 2.0, 0.0, Faction::Wild);
        grid.insert(minion, 3.0, 0.0, Faction::Player);

        let targets = grid.query_attackable(0.0, 0.0, 5.0, Faction::Wild);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].id, minion);

        let targets = grid.query_attackable(3.0, 0.0, 5.0, Faction::Player);
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn test_query_matches_brute_force() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut grid: SpatialGrid<usize> = SpatialGrid::new(3.5);
        let points: Vec<(f32, f32)> = (0..400)
            .map(|_| (rng.gen_range(-50.0..50.0), rng.gen_range(-50.0..50.0)))
            .collect();
        for (i, &(x, y)) in points.iter().enumerate() {
            grid.insert(i, x, y, Faction::Wild);
        }

        for _ in 0..50 {
            let (qx, qy) = (rng.gen_range(-60.0..60.0), rng.gen_range(-60.0..60.0));
            let radius = rng.gen_range(0.5..20.0);

            let mut found = grid.query_ids(qx, qy, radius);
            found.sort_unstable();
            let expected: Vec<usize> = points
                .iter()
                .enumerate()
                .filter(|&(_, &(x, y))| (x - qx).powi(2) + (y - qy).powi(2) <= radius * radius)
                .map(|(i, _)| i)
                .collect();

            assert_eq!(found, expected);
            assert_eq!(grid.any_closer_than(qx, qy, radius), !expected.is_empty());
        }
    }

    #[test]
    fn test_degenerate_radii() {
        let mut grid = SpatialGrid::new(4.0);
        let near = Entity::from_raw(1);
        let far = Entity::from_raw(2);
        grid.insert(near, 3.0, 0.0, Faction::Wild);
        grid.insert(far, -5000.0, 9000.0, Faction::Wild);

        assert!(grid.query_ids(0.0, 0.0, -5.0).is_empty());
        assert!(grid.query_ids(0.0, 0.0, f32::NAN).is_empty());
        assert!(!grid.any_closer_than(0.0, 0.0, -5.0));

        // Zero radius only matches an exact hit.
        assert!(grid.query_ids(0.0, 0.0, 0.0).is_empty());
        assert_eq!(grid.query_ids(3.0, 0.0, 0.0), vec![near]);

        assert_eq!(grid.query_ids(-50.0, -50.0, f32::INFINITY), vec![near, far]);
        assert_eq!(grid.query_ids(0.0, 0.0, 1.0e30), vec![near, far]);
        assert!(grid.any_closer_than(1.0e9, 1.0e9, f32::MAX));
    }

    #[test]
    fn test_sync_system_tracks_changes() {
        let mut world = World::new();
        world.insert_resource(SpatialGrid::<Entity>::new(5.0));

        let e = world
            .spawn((Position::new(1.0, 1.0), Faction::Wild, Lifecycle::Alive))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems(spatial_sync_system);
        schedule.run(&mut world);
        assert!(world.resource::<SpatialGrid>().contains(e));

        world.get_mut::<Position>(e).unwrap().x = 30.0;
        schedule.run(&mut world);
        assert_eq!(world.resource::<SpatialGrid>().get(e).map(|entry| entry.x), Some(30.0));

        *world.get_mut::<Lifecycle>(e).unwrap() = Lifecycle::Removed;
        schedule.run(&mut world);
        assert_eq!(world.resource::<SpatialGrid>().total_count(), 0);
    }
}
