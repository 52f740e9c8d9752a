use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a placed machine in the entity arena.
    pub struct MachineId;

    /// Identifies a transfer link (conveyor/pipe segment).
    pub struct LinkId;

    /// Identifies a power cable segment.
    pub struct CableId;

    /// Identifies a power grid built from a connected cable component.
    pub struct GridId;

    /// Identifies a spawned resource node (ore patch).
    pub struct ResourceNodeId;
}

/// Identifies an item (or fluid) type in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a recipe in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Identifies a machine archetype in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineTypeId(pub u32);

/// Identifies a transfer-link or cable archetype in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LinkTypeId(pub u32);

/// Identifies a resource-node archetype in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceTypeId(pub u32);

/// Addresses one I/O node: the owning machine plus the node's index in the
/// archetype's declaration order. Never owns the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub machine: MachineId,
    pub index: usize,
}

impl NodeRef {
    pub fn new(machine: MachineId, index: usize) -> Self {
        Self { machine, index }
    }
}
