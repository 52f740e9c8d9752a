//! Entity Manager: the arenas owning every runtime entity.
//!
//! Cross references between entities are slotmap keys into these arenas.
//! A key whose entity was removed simply stops resolving.

use crate::id::{MachineId, ResourceNodeId};
use crate::link::LinkNetwork;
use crate::machine::Machine;
use crate::power::CableNetwork;
use crate::resource::ResourceNode;
use crate::spatial::GridPosition;
use slotmap::SlotMap;

/// Which scheduler phase ticks a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineClass {
    /// Has a power producer (possibly a consumer too).
    Producer,
    /// Has a power consumer and no producer.
    Consumer,
    Plain,
}

impl MachineClass {
    pub fn of(machine: &Machine) -> Self {
        if machine.is_producer() {
            MachineClass::Producer
        } else if machine.is_consumer() {
            MachineClass::Consumer
        } else {
            MachineClass::Plain
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityManager {
    pub machines: SlotMap<MachineId, Machine>,
    pub links: LinkNetwork,
    pub cables: CableNetwork,
    pub resources: SlotMap<ResourceNodeId, ResourceNode>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Machine ids of one class, in arena order.
    pub fn machines_of(&self, class: MachineClass) -> Vec<MachineId> {
        self.machines
            .iter()
            .filter(|(_, m)| MachineClass::of(m) == class)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn machine_ids(&self) -> Vec<MachineId> {
        self.machines.keys().collect()
    }

    /// The resource node covering `tile`, if any.
    pub fn resource_at(&self, tile: GridPosition) -> Option<ResourceNodeId> {
        self.resources
            .iter()
            .find(|(_, r)| r.covers(tile))
            .map(|(id, _)| id)
    }

    pub fn entity_count(&self) -> usize {
        self.machines.len() + self.links.len() + self.cables.cable_count() + self.resources.len()
    }
}
