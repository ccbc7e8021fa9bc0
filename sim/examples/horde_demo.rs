//! Demonstration of the horde simulation.
//!
//! Run with: cargo run --example horde_demo
//! Set RUST_LOG=debug to watch aggro chains and deaths as they happen.

use horde_sim::{
    AggroState, Bounds, CreatureType, GroupSizeRange, Position, RegionConfig, SimWorld, TameResult,
};

fn main() {
    env_logger::init();
    println!("=== Horde Simulation Demo ===\n");

    let regions = [
        RegionConfig::new(
            1,
            Bounds::new(0.0, 0.0, 80.0, 80.0),
            vec![CreatureType::Slime, CreatureType::Wolf],
            20.0,
            GroupSizeRange::new(3, 6),
        ),
        RegionConfig::new(
            2,
            Bounds::new(80.0, 0.0, 160.0, 80.0),
            vec![CreatureType::Skeleton, CreatureType::Ogre],
            25.0,
            GroupSizeRange::new(2, 4),
        ),
    ];

    let mut sim = SimWorld::default();
    let groups = match sim.initialize_world(&regions, 7) {
        Ok(groups) => groups,
        Err(err) => {
            eprintln!("invalid regions: {err}");
            return;
        }
    };
    for report in sim.spawn_reports() {
        println!(
            "Region {}: {} groups, {} enemies ({} candidates rejected)",
            report.region, report.groups, report.members, report.rejected_candidates
        );
    }

    // Walk the player across the first region, straight through the groups.
    let dt = 1.0 / 30.0;
    let target = groups.first().map(|g| g.centroid).unwrap_or((40.0, 40.0));
    println!("\nPlayer walks from (0, 0) towards {:?}\n", target);

    for tick in 0..300 {
        let t = (tick as f32 / 300.0).min(1.0);
        let player = Position::new(target.0 * t, target.1 * t);
        sim.tick(dt, player);

        if (tick + 1) % 60 == 0 {
            let snapshot = sim.snapshot();
            let aggro = snapshot.groups.iter().filter(|g| g.state == AggroState::Aggro).count();
            let hits = sim.drain_player_contacts();
            println!(
                "--- Tick {} (t={:.1}s): {} groups, {} aggro, {} hits on player ---",
                sim.current_tick(),
                sim.current_time(),
                snapshot.groups.len(),
                aggro,
                hits.len()
            );
        }
    }

    // Kill the first enemy we can find and try to tame it.
    if let Some(victim) = sim.entity_snapshots().first().cloned() {
        let id = horde_sim::EntityId(victim.id);
        println!("\nKilling {:?} ({:?}): {:?}", id, victim.creature, sim.damage_entity(id, 1000.0));
        match sim.request_tame(Position::new(victim.x, victim.y), 2.0) {
            TameResult::Success(minion) => println!("Tamed {:?}, soul now {:?}", minion, sim.soul_meter()),
            other => println!("Tame failed: {:?}", other),
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("snapshot failed: {err}"),
    }
}
