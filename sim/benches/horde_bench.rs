use criterion::{black_box, criterion_group, criterion_main, Criterion};
use horde_sim::{Bounds, CreatureType, GroupSizeRange, PoissonDiskSampler, Position, RegionConfig, SimWorld};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn large_region() -> RegionConfig {
    RegionConfig::new(
        1,
        Bounds::new(0.0, 0.0, 500.0, 500.0),
        vec![CreatureType::Slime, CreatureType::Wolf, CreatureType::Skeleton, CreatureType::Ogre],
        12.0,
        GroupSizeRange::new(3, 6),
    )
}

fn bench_poisson(c: &mut Criterion) {
    let sampler = PoissonDiskSampler::new(Bounds::new(0.0, 0.0, 500.0, 500.0), 5.0, 30);
    c.bench_function("poisson_500x500_d5", |b| {
        b.iter(|| {
            let mut rng = ChaCha8Rng::seed_from_u64(1);
            black_box(sampler.sample(&mut rng).points.len())
        })
    });
}

fn bench_tick(c: &mut Criterion) {
    let mut sim = SimWorld::default();
    if let Err(err) = sim.initialize_world(&[large_region()], 1) {
        panic!("bench region rejected: {err}");
    }
    let player = Position::new(250.0, 250.0);
    c.bench_function("tick_500x500_horde", |b| b.iter(|| sim.tick(1.0 / 30.0, black_box(player))));
}

criterion_group!(benches, bench_poisson, bench_tick);
criterion_main!(benches);
