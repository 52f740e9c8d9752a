//! Power grid connectivity through the scheduler: rebuilds on cable and
//! machine changes, splits, merges and voltage separation.

use foundry_core::event::SimEvent;
use foundry_core::power::Voltage;
use foundry_core::sim::Scheduler;
use foundry_core::test_utils::*;

fn grids_rebuilt(events: &[SimEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SimEvent::GridRebuilt { .. }))
        .count()
}

// ===========================================================================
// Test 1: Cutting a cable splits the grid, re-laying it merges
// ===========================================================================
//
//   generator(0,0) ==X== (2,0) ==Y== press(4,0)

#[test]
fn cut_and_relay_cable() {
    let (mut world, ids) = empty_world();
    let generator = place_generator(&mut world, &ids, pos(0, 0));
    let press = place_consumer(&mut world, &ids, pos(4, 0));
    cable(&mut world, &ids, pos(0, 0), pos(2, 0));
    let y = cable(&mut world, &ids, pos(2, 0), pos(4, 0));

    let mut sched = Scheduler::new(world.config());
    let report = sched.tick(&mut world);
    assert_eq!(report.grids_rebuilt, 1);
    assert_eq!(world.grid_count(), 1);
    let shared = world.machine(generator).unwrap().grid;
    assert!(shared.is_some());
    assert_eq!(world.machine(press).unwrap().grid, shared);
    assert!(world.machine(press).unwrap().consumer().unwrap().has_power);

    // Steady state: nothing dirty, nothing rebuilt.
    assert_eq!(sched.tick(&mut world).grids_rebuilt, 0);

    world.remove_cable(y).unwrap();
    world.drain_events();
    sched.tick(&mut world);
    assert_eq!(grids_rebuilt(&world.drain_events()), 1);
    assert_eq!(world.grid_count(), 1);
    assert_eq!(world.cable_count(), 1);
    assert!(world.machine(generator).unwrap().grid.is_some());
    assert_eq!(world.machine(press).unwrap().grid, None);
    assert!(!world.machine(press).unwrap().consumer().unwrap().has_power);

    cable(&mut world, &ids, pos(2, 0), pos(4, 0));
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 1);
    let grid = &world.snapshot_grids()[0];
    assert_eq!(grid.cable_count, 2);
    assert_eq!(grid.machines.len(), 2);
    assert!(grid.machines.contains(&generator));
    assert!(grid.machines.contains(&press));
    assert!(world.machine(press).unwrap().consumer().unwrap().has_power);
}

// ===========================================================================
// Test 2: Two islands join through a bridging cable
// ===========================================================================

#[test]
fn bridge_merges_islands() {
    let (mut world, ids) = empty_world();
    place_generator(&mut world, &ids, pos(0, 0));
    let press = place_consumer(&mut world, &ids, pos(3, 0));
    cable(&mut world, &ids, pos(0, 0), pos(1, 0));
    cable(&mut world, &ids, pos(3, 0), pos(2, 0));

    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 2);
    // The press's island has no producer, so even the idle draw fails.
    assert!(!world.machine(press).unwrap().consumer().unwrap().has_power);

    cable(&mut world, &ids, pos(1, 0), pos(2, 0));
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 1);
    assert_eq!(world.snapshot_grids()[0].cable_count, 3);
    assert!(world.machine(press).unwrap().consumer().unwrap().has_power);
}

// ===========================================================================
// Test 3: Cables of different voltage share endpoints but not grids
// ===========================================================================

#[test]
fn voltage_tiers_stay_separate() {
    let (mut world, ids) = empty_world();
    place_generator(&mut world, &ids, pos(0, 0));
    cable(&mut world, &ids, pos(0, 0), pos(2, 0));
    world.add_cable(ids.mv_cable, pos(2, 0), pos(2, 2)).unwrap();

    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 2);

    let mut voltages: Vec<Voltage> = world.snapshot_grids().iter().map(|g| g.voltage).collect();
    voltages.sort();
    assert_eq!(voltages, vec![Voltage::Lv, Voltage::Mv]);

    // The cables still know about each other as neighbours.
    let cables = world.snapshot_cables();
    assert_eq!(cables.len(), 2);
    assert_ne!(cables[0].grid, cables[1].grid);
    assert!(cables.iter().all(|c| !c.dirty));
}

// ===========================================================================
// Test 4: Placing and removing machines on existing cables
// ===========================================================================

#[test]
fn machines_join_and_leave_existing_grid() {
    let (mut world, ids) = empty_world();
    cable(&mut world, &ids, pos(0, 0), pos(4, 0));

    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 1);
    assert!(world.snapshot_grids()[0].machines.is_empty());

    let generator = place_generator(&mut world, &ids, pos(0, 0));
    let press = place_consumer(&mut world, &ids, pos(4, 0));
    sched.tick(&mut world);
    let grid = &world.snapshot_grids()[0];
    assert_eq!(grid.machines, vec![generator, press]);

    world.remove_machine(generator).unwrap();
    sched.tick(&mut world);
    let grid = &world.snapshot_grids()[0];
    assert_eq!(grid.machines, vec![press]);
    assert_eq!(grid.available_wattage, 0);
    assert!(!world.machine(press).unwrap().consumer().unwrap().has_power);
}

// ===========================================================================
// Test 5: Grid idle counter tracks the last successful draw
// ===========================================================================

#[test]
fn idle_ticks_count_up_without_draws() {
    let (mut world, ids) = empty_world();
    place_generator(&mut world, &ids, pos(0, 0));
    cable(&mut world, &ids, pos(0, 0), pos(1, 0));

    let mut sched = Scheduler::new(world.config());
    run_ticks(&mut sched, &mut world, 10);
    let grid = &world.snapshot_grids()[0];
    assert_eq!(grid.idle_ticks, 10);
    assert_eq!(grid.available_wattage, 100);

    run_ticks(&mut sched, &mut world, 100);
    assert_eq!(world.snapshot_grids()[0].idle_ticks, world.config().recency_cap);
}

// ===========================================================================
// Test 6: Removing a grid's only cable destroys the grid
// ===========================================================================
//
//   generator(0,3) ==== press(0,0)

#[test]
fn removing_last_cable_unpowers_consumer() {
    let (mut world, ids) = empty_world();
    let press = place_consumer(&mut world, &ids, pos(0, 0));
    let generator = place_generator(&mut world, &ids, pos(0, 3));
    let only = cable(&mut world, &ids, pos(0, 3), pos(0, 0));

    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 1);
    assert!(world.machine(press).unwrap().consumer().unwrap().has_power);

    world.remove_cable(only).unwrap();
    let report = sched.tick(&mut world);
    assert_eq!(report.grids_rebuilt, 0);
    assert_eq!(world.grid_count(), 0);
    assert!(world.snapshot_grids().is_empty());
    assert_eq!(world.machine(press).unwrap().grid, None);
    assert_eq!(world.machine(generator).unwrap().grid, None);
    assert!(!world.machine(press).unwrap().consumer().unwrap().has_power);

    // Stays unpowered on later ticks too.
    run_ticks(&mut sched, &mut world, 3);
    assert!(!world.machine(press).unwrap().consumer().unwrap().has_power);
}

// ===========================================================================
// Test 7: A producer touched by two voltage tiers feeds only its own
// ===========================================================================
//
//   MV cable (0,-2) ==== generator(0,0) ==== LV cable (0,2) press

#[test]
fn producer_is_not_shared_across_voltage_tiers() {
    let (mut world, ids) = empty_world();
    let generator = place_generator(&mut world, &ids, pos(0, 0));
    let press = place_consumer(&mut world, &ids, pos(0, 2));
    cable(&mut world, &ids, pos(0, 0), pos(0, 2));
    world.add_cable(ids.mv_cable, pos(0, 0), pos(0, -2)).unwrap();

    let mut sched = Scheduler::new(world.config());
    sched.tick(&mut world);
    assert_eq!(world.grid_count(), 2);

    let grids = world.snapshot_grids();
    let lv = grids.iter().find(|g| g.voltage == Voltage::Lv).unwrap();
    let mv = grids.iter().find(|g| g.voltage == Voltage::Mv).unwrap();
    assert_eq!(lv.machines, vec![generator, press]);
    assert!(mv.machines.is_empty());
    assert_eq!(mv.available_wattage, 0);
    // The idle press took 60 of the generator's 100.
    assert_eq!(lv.available_wattage, 40);
    assert_eq!(world.machine(generator).unwrap().producer().unwrap().buffer, 40);
}
