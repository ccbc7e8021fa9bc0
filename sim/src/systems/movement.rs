//! Movement system - applies velocity to position.

use crate::components::*;
use bevy_ecs::prelude::*;

/// Resource containing the delta time for the current tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Resource holding the current simulation tick number.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// System that applies velocity to position.
///
/// Only living entities move. Group members are kept inside their home
/// region; heading follows the velocity. Stationary entities are not
/// touched so change detection leaves them out of the next grid sync.
pub fn movement_system(
    dt: Res<DeltaTime>,
    mut query: Query<(&mut Position, &Velocity, &mut Heading, &Lifecycle, Option<&HomeRegion>)>,
) {
    let delta = dt.0;
    for (mut pos, vel, mut heading, lifecycle, home) in query.iter_mut() {
        if !lifecycle.is_alive() || vel.is_zero() {
            continue;
        }

        let mut x = pos.x + vel.vx * delta;
        let mut y = pos.y + vel.vy * delta;
        if let Some(home) = home {
            (x, y) = home.bounds.clamp(x, y);
        }

        pos.x = x;
        pos.y = y;
        heading.0 = vel.vy.atan2(vel.vx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_movement(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(movement_system);
        schedule.run(world);
    }

    #[test]
    fn test_movement_applies_velocity() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        world.spawn((
            Position::new(0.0, 0.0),
            Velocity::new(5.0, 3.0),
            Heading::default(),
            Lifecycle::Alive,
        ));
        run_movement(&mut world);

        let mut query = world.query::<(&Position, &Heading)>();
        let (pos, heading) = query.single(&world);
        assert!((pos.x - 5.0).abs() < 0.001);
        assert!((pos.y - 3.0).abs() < 0.001);
        assert!((heading.0 - 3.0_f32.atan2(5.0)).abs() < 1e-6);
    }

    #[test]
    fn test_members_stay_in_home_region() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        world.spawn((
            Position::new(9.0, 5.0),
            Velocity::new(4.0, 0.0),
            Heading::default(),
            Lifecycle::Alive,
            HomeRegion { id: 1, bounds: Bounds::new(0.0, 0.0, 10.0, 10.0) },
        ));
        run_movement(&mut world);

        let pos = *world.query::<&Position>().single(&world);
        assert_eq!(pos, Position::new(10.0, 5.0));
    }

    #[test]
    fn test_corpses_do_not_move() {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0));

        world.spawn((
            Position::new(1.0, 1.0),
            Velocity::new(4.0, 0.0),
            Heading::default(),
            Lifecycle::Corpse { expires_at: 10 },
        ));
        run_movement(&mut world);

        let pos = *world.query::<&Position>().single(&world);
        assert_eq!(pos, Position::new(1.0, 1.0));
    }
}
