//! Read-only query API for inspecting simulation state.
//!
//! Snapshot types aggregate world state into owned views for rendering and
//! UI consumers. None of them hold references into world storage.

use crate::component::Component;
use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use crate::link::LinkUsage;
use crate::node::{IoNode, NodeDirection, NodeKind};
use crate::power::Voltage;
use crate::recipe::RunnerState;
use crate::spatial::{GridPosition, Rotation};
use crate::world::World;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Machine snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: NodeKind,
    pub direction: NodeDirection,
    pub position: GridPosition,
    pub item: Option<ItemId>,
    pub quantity: u32,
    pub capacity: u32,
}

impl From<&IoNode> for NodeSnapshot {
    fn from(n: &IoNode) -> Self {
        Self {
            name: n.name.clone(),
            kind: n.kind,
            direction: n.direction,
            position: n.position,
            item: n.item(),
            quantity: n.quantity(),
            capacity: n.capacity(),
        }
    }
}

/// Display state of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentSnapshot {
    RecipeRunner {
        recipe: Option<RecipeId>,
        state: RunnerState,
        progress: Ticks,
        /// Progress as a 0..1 fraction.
        percent: Fixed64,
    },
    PowerConsumer {
        has_power: bool,
        last_demand: u64,
        voltage: Voltage,
    },
    PowerProducer {
        buffer: u64,
        max_buffer: u64,
        online: bool,
        voltage: Voltage,
    },
    Importer {
        progress: u32,
        transfer_ticks: u32,
    },
    FluidConsumer {
        satisfied: bool,
    },
    MiningDrill {
        progress: u32,
        ticks_per_cycle: u32,
        resource: Option<ResourceNodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub id: MachineId,
    pub archetype: MachineTypeId,
    pub position: GridPosition,
    pub rotation: Rotation,
    pub enabled: bool,
    pub grid: Option<GridId>,
    pub nodes: Vec<NodeSnapshot>,
    pub components: Vec<ComponentSnapshot>,
}

// ---------------------------------------------------------------------------
// Link, cable, grid, resource snapshots
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub id: LinkId,
    pub start: GridPosition,
    pub end: GridPosition,
    pub archetype: LinkTypeId,
    pub is_root: bool,
    pub ticks_since_transfer: u32,
    pub used_this_tick: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableSnapshot {
    pub id: CableId,
    pub start: GridPosition,
    pub end: GridPosition,
    pub archetype: LinkTypeId,
    pub voltage: Voltage,
    pub grid: Option<GridId>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub id: GridId,
    pub voltage: Voltage,
    pub machines: Vec<MachineId>,
    pub cable_count: usize,
    pub available_wattage: u64,
    pub idle_ticks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNodeSnapshot {
    pub id: ResourceNodeId,
    pub archetype: ResourceTypeId,
    pub position: GridPosition,
    pub size: (u32, u32),
    pub remaining: Option<u64>,
    pub extracted: u64,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

impl World {
    pub fn snapshot_machine(&self, id: MachineId) -> Option<MachineSnapshot> {
        let m = self.entities.machines.get(id)?;
        let components = m
            .components
            .iter()
            .map(|c| match c {
                Component::RecipeRunner(r) => ComponentSnapshot::RecipeRunner {
                    recipe: r.recipe(),
                    state: r.state(),
                    progress: r.progress(),
                    percent: r.progress_pct(self.catalog()),
                },
                Component::PowerConsumer(p) => ComponentSnapshot::PowerConsumer {
                    has_power: p.has_power,
                    last_demand: p.last_demand,
                    voltage: p.voltage,
                },
                Component::PowerProducer(p) => ComponentSnapshot::PowerProducer {
                    buffer: p.buffer,
                    max_buffer: p.max_buffer,
                    online: p.online,
                    voltage: p.voltage,
                },
                Component::Importer(i) => ComponentSnapshot::Importer {
                    progress: i.progress,
                    transfer_ticks: i.transfer_ticks,
                },
                Component::FluidConsumer(f) => ComponentSnapshot::FluidConsumer {
                    satisfied: f.satisfied,
                },
                Component::MiningDrill(d) => ComponentSnapshot::MiningDrill {
                    progress: d.progress,
                    ticks_per_cycle: d.ticks_per_cycle,
                    resource: d.resource,
                },
            })
            .collect();

        Some(MachineSnapshot {
            id,
            archetype: m.archetype,
            position: m.position,
            rotation: m.rotation,
            enabled: m.enabled,
            grid: m.grid,
            nodes: m.nodes.iter().map(NodeSnapshot::from).collect(),
            components,
        })
    }

    /// Snapshots of every machine in arena order.
    pub fn snapshot_machines(&self) -> Vec<MachineSnapshot> {
        self.entities
            .machines
            .keys()
            .filter_map(|id| self.snapshot_machine(id))
            .collect()
    }

    pub fn snapshot_links(&self) -> Vec<LinkSnapshot> {
        self.entities
            .links
            .iter()
            .map(|(id, l)| LinkSnapshot {
                id,
                start: l.start,
                end: l.end,
                archetype: l.archetype,
                is_root: l.is_root(),
                ticks_since_transfer: l.ticks_since_transfer,
                used_this_tick: l.usage != LinkUsage::Unused,
            })
            .collect()
    }

    pub fn snapshot_cables(&self) -> Vec<CableSnapshot> {
        self.entities
            .cables
            .cables()
            .map(|(id, c)| CableSnapshot {
                id,
                start: c.start,
                end: c.end,
                archetype: c.archetype,
                voltage: c.voltage,
                grid: c.grid,
                dirty: c.dirty,
            })
            .collect()
    }

    pub fn snapshot_grids(&self) -> Vec<GridSnapshot> {
        self.entities
            .cables
            .grids()
            .map(|(id, g)| GridSnapshot {
                id,
                voltage: g.voltage,
                machines: g.connections.clone(),
                cable_count: g.cables.len(),
                available_wattage: g.available_wattage,
                idle_ticks: g.idle_ticks,
            })
            .collect()
    }

    pub fn snapshot_resources(&self) -> Vec<ResourceNodeSnapshot> {
        self.entities
            .resources
            .iter()
            .map(|(id, r)| ResourceNodeSnapshot {
                id,
                archetype: r.archetype,
                position: r.position,
                size: r.size,
                remaining: r.remaining,
                extracted: r.extracted,
            })
            .collect()
    }

    /// The item or fluid node at `pos`, if any.
    pub fn item_node_at(&self, pos: GridPosition) -> Option<NodeSnapshot> {
        let node = self.io.item_node_at(pos)?;
        self.node(node).map(NodeSnapshot::from)
    }

    /// The energy node at `pos`, if any.
    pub fn energy_node_at(&self, pos: GridPosition) -> Option<NodeSnapshot> {
        let node = self.io.energy_node_at(pos)?;
        self.node(node).map(NodeSnapshot::from)
    }

    pub fn node(&self, node: NodeRef) -> Option<&IoNode> {
        self.entities.machines.get(node.machine)?.nodes.get(node.index)
    }

    pub fn machine_at(&self, pos: GridPosition) -> Option<MachineId> {
        self.io.machine_at(pos)
    }

    pub fn resource_at(&self, pos: GridPosition) -> Option<ResourceNodeId> {
        self.entities.resource_at(pos)
    }

    /// Total quantity of `item` held across every machine node.
    pub fn total_in_nodes(&self, item: ItemId) -> u64 {
        self.entities
            .machines
            .values()
            .flat_map(|m| m.nodes.iter())
            .map(|n| n.quantity_of(item) as u64)
            .sum()
    }

    pub fn machine_count(&self) -> usize {
        self.entities.machines.len()
    }

    pub fn link_count(&self) -> usize {
        self.entities.links.len()
    }

    pub fn cable_count(&self) -> usize {
        self.entities.cables.cable_count()
    }

    pub fn grid_count(&self) -> usize {
        self.entities.cables.grid_count()
    }
}
