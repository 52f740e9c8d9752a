//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::catalog::*;
use crate::config::SimConfig;
use crate::fixed::Fixed64;
use crate::id::*;
use crate::node::{NodeDirection, NodeKind};
use crate::power::Voltage;
use crate::sim::{Scheduler, TickReport};
use crate::spatial::{GridPosition, Rotation};
use crate::world::World;
use std::collections::BTreeSet;
use std::sync::Arc;

// ===========================================================================
// Fixed-point and position helpers
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn pos(x: i32, y: i32) -> GridPosition {
    GridPosition::new(x, y)
}

pub fn caps(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ===========================================================================
// Standard test catalog
// ===========================================================================

/// Ids of everything registered by [`standard_catalog`].
#[derive(Debug, Clone, Copy)]
pub struct TestIds {
    // Items
    pub stone: ItemId,
    pub gravel: ItemId,
    pub sand: ItemId,
    pub water: ItemId,
    pub energy: ItemId,
    // Recipes
    pub crush_stone: RecipeId,
    pub press_gravel: RecipeId,
    pub burn_gravel: RecipeId,
    // Machines
    pub crusher: MachineTypeId,
    pub generator: MachineTypeId,
    pub press: MachineTypeId,
    pub boiler: MachineTypeId,
    pub steam_engine: MachineTypeId,
    pub importer: MachineTypeId,
    pub drill: MachineTypeId,
    // Links and cables
    pub conveyor: LinkTypeId,
    pub fast_conveyor: LinkTypeId,
    pub pipe: LinkTypeId,
    pub lv_cable: LinkTypeId,
    pub mv_cable: LinkTypeId,
    // Resources
    pub stone_patch: ResourceTypeId,
}

pub fn node(id: &str, kind: NodeKind, direction: NodeDirection, offset: (i32, i32)) -> NodeDescriptor {
    NodeDescriptor {
        id: id.to_string(),
        kind,
        direction,
        offset: (Fixed64::from_num(offset.0), Fixed64::from_num(offset.1)),
        capacity: if kind.holds_items() { 16 } else { 0 },
    }
}

fn archetype(key: &str, nodes: Vec<NodeDescriptor>, components: Vec<ComponentSpec>) -> MachineArchetype {
    MachineArchetype {
        key: key.to_string(),
        name: key.replace('_', " "),
        footprint: vec![(0, 0)],
        center: (0, 0),
        nodes,
        components,
    }
}

fn recipe(
    key: &str,
    inputs: Vec<RecipeEntry>,
    outputs: Vec<RecipeEntry>,
    capability: &str,
    duration: u64,
    output_kind: OutputKind,
) -> RecipeDef {
    RecipeDef {
        key: key.to_string(),
        name: key.replace('_', " "),
        inputs,
        outputs,
        required_capabilities: caps(&[capability]),
        duration,
        output_kind,
    }
}

/// A small, fully wired content set:
///
/// - `rock_crusher`: `in_main` west, `out_main` east, crushing runner
/// - `generator`: 100 W producer with a 100 W buffer, energy node on its tile
/// - `electric_press`: 120 W active / 60 W idle LV consumer plus a pressing runner
/// - `boiler`: burns gravel into 50 W of buffered energy (forced recipe)
/// - `steam_engine`: burns one water per tick to generate 10 W
/// - `import_port`: ships `item_in` to the global inventory every 2 ticks
/// - `stone_drill`: mines one unit every 3 ticks into `out_main`
pub fn standard_catalog() -> (Catalog, TestIds) {
    let mut b = CatalogBuilder::new();

    let stone = b.register_item("stone");
    let gravel = b.register_item("gravel");
    let sand = b.register_item("sand");
    let water = b.register_item("water");
    let energy = b.register_item("energy");

    let crush_stone = b.register_recipe(recipe(
        "crush_stone",
        vec![RecipeEntry::new(stone, 1)],
        vec![RecipeEntry::new(gravel, 1)],
        "crushing",
        5,
        OutputKind::Item,
    ));
    let press_gravel = b.register_recipe(recipe(
        "press_gravel",
        vec![RecipeEntry::new(gravel, 2)],
        vec![RecipeEntry::new(sand, 1)],
        "pressing",
        3,
        OutputKind::Item,
    ));
    let burn_gravel = b.register_recipe(recipe(
        "burn_gravel",
        vec![RecipeEntry::new(gravel, 1)],
        vec![RecipeEntry::new(energy, 50)],
        "burning",
        2,
        OutputKind::Energy,
    ));

    use NodeDirection::{Input, Output};
    use NodeKind::{Energy, Fluid, Item};

    let crusher = b.register_machine(archetype(
        "rock_crusher",
        vec![
            node("in_main", Item, Input, (-1, 0)),
            node("out_main", Item, Output, (1, 0)),
        ],
        vec![ComponentSpec::RecipeRunner {
            capabilities: caps(&["crushing"]),
            forced_recipe: None,
        }],
    ));
    let generator = b.register_machine(archetype(
        "generator",
        vec![node("power", Energy, Output, (0, 0))],
        vec![ComponentSpec::PowerProducer {
            watts: 100,
            voltage: Voltage::Lv,
            max_buffer: 100,
        }],
    ));
    let press = b.register_machine(archetype(
        "electric_press",
        vec![
            node("in_main", Item, Input, (-1, 0)),
            node("out_main", Item, Output, (1, 0)),
            node("power", Energy, Input, (0, 0)),
        ],
        vec![
            ComponentSpec::PowerConsumer {
                watts_required: 120,
                idle_watts: 60,
                voltage: Voltage::Lv,
            },
            ComponentSpec::RecipeRunner {
                capabilities: caps(&["pressing"]),
                forced_recipe: None,
            },
        ],
    ));
    let boiler = b.register_machine(archetype(
        "boiler",
        vec![
            node("in_main", Item, Input, (-1, 0)),
            node("power", Energy, Output, (0, 0)),
        ],
        vec![
            ComponentSpec::RecipeRunner {
                capabilities: caps(&["burning"]),
                forced_recipe: Some(burn_gravel),
            },
            ComponentSpec::PowerProducer {
                watts: 0,
                voltage: Voltage::Lv,
                max_buffer: 200,
            },
        ],
    ));
    let steam_engine = b.register_machine(archetype(
        "steam_engine",
        vec![
            node("fluid_in", Fluid, Input, (-1, 0)),
            node("power", Energy, Output, (0, 0)),
        ],
        vec![
            ComponentSpec::FluidConsumer {
                fluid: water,
                consumption_rate: 1,
                node: "fluid_in".into(),
            },
            ComponentSpec::PowerProducer {
                watts: 10,
                voltage: Voltage::Lv,
                max_buffer: 100,
            },
        ],
    ));
    let importer = b.register_machine(archetype(
        "import_port",
        vec![node("item_in", Item, Input, (-1, 0))],
        vec![ComponentSpec::Importer {
            transfer_ticks: 2,
            transfer_quantity: 4,
            node: "item_in".into(),
        }],
    ));
    let drill = b.register_machine(archetype(
        "stone_drill",
        vec![node("out_main", Item, Output, (1, 0))],
        vec![ComponentSpec::MiningDrill {
            ticks_per_cycle: 3,
            quantity: 1,
        }],
    ));

    let conveyor = b.register_link(LinkArchetype {
        key: "conveyor".into(),
        kind: LinkKind::Item,
        transfer_quantity: 1,
        transfer_ticks: 1,
        voltage: Voltage::Lv,
    });
    let fast_conveyor = b.register_link(LinkArchetype {
        key: "fast_conveyor".into(),
        kind: LinkKind::Item,
        transfer_quantity: 4,
        transfer_ticks: 1,
        voltage: Voltage::Lv,
    });
    let pipe = b.register_link(LinkArchetype {
        key: "pipe".into(),
        kind: LinkKind::Fluid,
        transfer_quantity: 2,
        transfer_ticks: 1,
        voltage: Voltage::Lv,
    });
    let lv_cable = b.register_link(LinkArchetype {
        key: "lv_cable".into(),
        kind: LinkKind::Power,
        transfer_quantity: 0,
        transfer_ticks: 0,
        voltage: Voltage::Lv,
    });
    let mv_cable = b.register_link(LinkArchetype {
        key: "mv_cable".into(),
        kind: LinkKind::Power,
        transfer_quantity: 0,
        transfer_ticks: 0,
        voltage: Voltage::Mv,
    });

    let stone_patch = b.register_resource(ResourceArchetype {
        key: "stone_patch".into(),
        size: (3, 3),
        drop_table: vec![(stone, Fixed64::ONE)],
        amount: Some(20),
    });

    let ids = TestIds {
        stone,
        gravel,
        sand,
        water,
        energy,
        crush_stone,
        press_gravel,
        burn_gravel,
        crusher,
        generator,
        press,
        boiler,
        steam_engine,
        importer,
        drill,
        conveyor,
        fast_conveyor,
        pipe,
        lv_cable,
        mv_cable,
        stone_patch,
    };

    match b.build() {
        Ok(catalog) => (catalog, ids),
        Err(e) => panic!("standard test catalog is invalid: {e}"),
    }
}

// ===========================================================================
// World helpers
// ===========================================================================

/// A world over the standard catalog with default configuration.
pub fn empty_world() -> (World, TestIds) {
    world_with_config(SimConfig::default())
}

pub fn world_with_config(config: SimConfig) -> (World, TestIds) {
    let (catalog, ids) = standard_catalog();
    (World::new(Arc::new(catalog), config), ids)
}

/// Place an unrotated machine, panicking on failure.
pub fn place(world: &mut World, archetype: MachineTypeId, at: GridPosition) -> MachineId {
    match world.place_machine(archetype, at, Rotation::None) {
        Ok(id) => id,
        Err(e) => panic!("placing {archetype:?} at {at:?} failed: {e}"),
    }
}

/// A rock crusher with `crush_stone` selected.
pub fn place_crusher(world: &mut World, ids: &TestIds, at: GridPosition) -> MachineId {
    let id = place(world, ids.crusher, at);
    if let Err(e) = world.set_recipe(id, Some(ids.crush_stone)) {
        panic!("selecting crush_stone failed: {e}");
    }
    id
}

pub fn place_generator(world: &mut World, ids: &TestIds, at: GridPosition) -> MachineId {
    place(world, ids.generator, at)
}

/// An electric press with `press_gravel` selected.
pub fn place_consumer(world: &mut World, ids: &TestIds, at: GridPosition) -> MachineId {
    let id = place(world, ids.press, at);
    if let Err(e) = world.set_recipe(id, Some(ids.press_gravel)) {
        panic!("selecting press_gravel failed: {e}");
    }
    id
}

pub fn cable(world: &mut World, ids: &TestIds, from: GridPosition, to: GridPosition) -> CableId {
    match world.add_cable(ids.lv_cable, from, to) {
        Ok(id) => id,
        Err(e) => panic!("adding cable failed: {e}"),
    }
}

pub fn conveyor(world: &mut World, ids: &TestIds, from: GridPosition, to: GridPosition) -> LinkId {
    match world.add_link(ids.conveyor, from, to) {
        Ok(id) => id,
        Err(e) => panic!("adding conveyor failed: {e}"),
    }
}

/// Quantity held in a named node of a machine (0 if absent).
pub fn node_qty(world: &World, machine: MachineId, node: &str) -> u32 {
    world
        .machine(machine)
        .and_then(|m| m.node(node))
        .map_or(0, |n| n.quantity())
}

/// Item held in a named node of a machine.
pub fn node_item(world: &World, machine: MachineId, node: &str) -> Option<ItemId> {
    world.machine(machine).and_then(|m| m.node(node)).and_then(|n| n.item())
}

/// Run `n` scheduler ticks, returning the last report.
pub fn run_ticks(sched: &mut Scheduler, world: &mut World, n: u32) -> TickReport {
    let mut last = TickReport::default();
    for _ in 0..n {
        last = sched.tick(world);
    }
    last
}
