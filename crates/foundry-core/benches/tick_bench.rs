//! Criterion benchmarks for the Foundry tick pipeline.
//!
//! Three benchmark groups:
//! - `crusher_rows`: 200 crushers feeding idle sinks over two-hop conveyors
//! - `powered_grid`: 100 presses and 100 generators on one LV grid
//! - `grid_rebuild`: cost of a tick that has to rebuild a 200-cable grid

use criterion::{Criterion, criterion_group, criterion_main};
use foundry_core::id::CableId;
use foundry_core::sim::Scheduler;
use foundry_core::test_utils::*;
use foundry_core::world::World;

// ===========================================================================
// Factory builders
// ===========================================================================

/// 200 rows of crusher -> conveyor -> conveyor -> idle crusher.
fn build_crusher_rows() -> World {
    let (mut world, ids) = empty_world();
    for row in 0..200 {
        let y = row * 2;
        let crusher = place_crusher(&mut world, &ids, pos(0, y));
        place(&mut world, ids.crusher, pos(4, y));
        conveyor(&mut world, &ids, pos(1, y), pos(2, y));
        conveyor(&mut world, &ids, pos(2, y), pos(3, y));
        let _ = world.inject(crusher, "in_main", ids.stone, 16);
    }
    world
}

/// 100 presses, each with a generator two tiles south, all generators
/// chained by cable. Returns the world and the id of the first chain cable.
fn build_powered_grid() -> (World, CableId) {
    let (mut world, ids) = empty_world();
    let mut first = None;
    for i in 0..100 {
        let x = i * 3;
        let press = place_consumer(&mut world, &ids, pos(x, 0));
        place_generator(&mut world, &ids, pos(x, 2));
        let _ = world.inject(press, "in_main", ids.gravel, 16);
        cable(&mut world, &ids, pos(x, 2), pos(x, 0));
        let link = cable(&mut world, &ids, pos(x, 2), pos(x + 3, 2));
        first.get_or_insert(link);
    }
    let first = first.unwrap_or_default();
    (world, first)
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_crusher_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("crusher_rows");
    group.sample_size(50);

    let mut world = build_crusher_rows();
    let mut sched = Scheduler::new(world.config());

    group.bench_function("200_rows_400_links", |b| {
        b.iter(|| {
            sched.tick(&mut world);
        });
    });

    group.finish();
}

fn bench_powered_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("powered_grid");
    group.sample_size(50);

    let (mut world, _) = build_powered_grid();
    let mut sched = Scheduler::new(world.config());
    // Warm up: the first tick performs the initial grid build.
    sched.tick(&mut world);

    group.bench_function("100_consumers_100_producers", |b| {
        b.iter(|| {
            sched.tick(&mut world);
        });
    });

    group.finish();
}

fn bench_grid_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_rebuild");
    group.sample_size(30);

    let (mut world, first) = build_powered_grid();
    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    let lv_cable = world.catalog().link_id("lv_cable");
    let endpoints = world
        .entities()
        .cables
        .cable(first)
        .map(|c| (c.start, c.end));

    group.bench_function("remove_and_readd_cable", |b| {
        let mut current = first;
        b.iter(|| {
            let (Some(archetype), Some((start, end))) = (lv_cable, endpoints) else {
                return;
            };
            let _ = world.remove_cable(current);
            sched.tick(&mut world);
            if let Ok(id) = world.add_cable(archetype, start, end) {
                current = id;
            }
            sched.tick(&mut world);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_crusher_rows,
    bench_powered_grid,
    bench_grid_rebuild
);
criterion_main!(benches);
