//! Foundry Core -- the simulation engine for grid-based factory games.
//!
//! Machines placed on a tile grid run recipes against typed I/O nodes,
//! transfer links move items between those nodes, and power cables merge
//! into grids that gate which machines may run. Everything advances in
//! fixed ticks driven by a wall-clock accumulator, with integer quantities
//! and Q32.32 fixed-point time so runs are reproducible.
//!
//! # Seven-Phase Tick Pipeline
//!
//! Each call to [`sim::Scheduler::tick`] advances a [`world::World`] by one
//! tick through the following phases:
//!
//! 1. **Link reset** -- Clear every link's per-tick usage mark.
//! 2. **Producers** -- Machines with a power producer fill their buffers.
//! 3. **Grids** -- Dirty cable components are rebuilt, then every grid
//!    recomputes its available wattage.
//! 4. **Consumers** -- Machines with a power consumer draw from their grid
//!    and run their other components.
//! 5. **Machines** -- Every remaining machine ticks.
//! 6. **Links** -- Root links count progress and push items down their chains.
//! 7. **Catch-all** -- Anything still unticked (reported in the [`sim::TickReport`]).
//!
//! # Key Types
//!
//! - [`world::World`] -- Explicit simulation context: entities, spatial
//!   registry, inventory, RNG and events. All mutation goes through it.
//! - [`sim::Scheduler`] -- Fixed-timestep driver with a catch-up cap.
//! - [`catalog::Catalog`] -- Immutable registry of items, recipes, machine,
//!   link and resource archetypes (frozen at startup).
//! - [`machine::Machine`] -- Placed archetype owning nodes and components.
//! - [`link::LinkNetwork`] -- Transfer links with round-robin pathfinding.
//! - [`power::CableNetwork`] -- Cables, grids and dirty-driven rebuilds.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`query`] -- Serializable snapshots for UI and tooling.

pub mod catalog;
pub mod component;
pub mod config;
pub mod entity;
pub mod event;
pub mod fixed;
pub mod id;
pub mod inventory;
pub mod link;
pub mod machine;
pub mod node;
pub mod power;
pub mod query;
pub mod recipe;
pub mod resource;
pub mod rng;
pub mod sim;
pub mod spatial;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
