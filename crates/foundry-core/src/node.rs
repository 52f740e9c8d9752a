//! I/O nodes: the typed ports through which machines exchange material.
//!
//! An item or fluid node holds at most one item kind at a time. Energy nodes
//! hold nothing; they only mark where a cable plugs into the machine's power
//! components.
//!
//! The free functions at the bottom implement the recipe-side allocation
//! rules over a machine's node list: summed availability, first-fit
//! deduction and first-fit deposit with empty-node claiming, all in node
//! declaration order.

use crate::id::ItemId;
use crate::spatial::GridPosition;
use serde::{Deserialize, Serialize};

/// Capacity used when a node descriptor does not give one.
pub const DEFAULT_NODE_CAPACITY: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Item,
    Fluid,
    Energy,
}

impl NodeKind {
    /// Item and fluid nodes carry stock; energy nodes do not.
    pub fn holds_items(self) -> bool {
        !matches!(self, NodeKind::Energy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeDirection {
    Input,
    Output,
}

/// A runtime I/O node owned by a machine.
///
/// Invariants: `quantity <= capacity`, and `quantity == 0` implies no item
/// once the owning machine has finished its tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoNode {
    /// Descriptor id from the archetype, e.g. `"in_main"`.
    pub name: String,
    pub kind: NodeKind,
    pub direction: NodeDirection,
    /// Absolute position, derived from the machine's placement.
    pub position: GridPosition,
    item: Option<ItemId>,
    quantity: u32,
    capacity: u32,
}

impl IoNode {
    pub fn new(
        name: impl Into<String>,
        kind: NodeKind,
        direction: NodeDirection,
        position: GridPosition,
        capacity: u32,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            direction,
            position,
            item: None,
            quantity: 0,
            capacity: if kind.holds_items() { capacity } else { 0 },
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn free_space(&self) -> u32 {
        self.capacity - self.quantity
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Whether `item` could be stored here right now (ignoring space).
    pub fn accepts(&self, item: ItemId) -> bool {
        self.kind.holds_items() && (self.item.is_none() || self.item == Some(item))
    }

    /// The quantity of `item` held here.
    pub fn quantity_of(&self, item: ItemId) -> u32 {
        if self.item == Some(item) { self.quantity } else { 0 }
    }

    /// Add items. Returns the amount accepted (0 if the node holds a
    /// different item or is an energy node).
    #[must_use = "returns the quantity accepted, which may be less than offered"]
    pub fn insert(&mut self, item: ItemId, quantity: u32) -> u32 {
        if !self.accepts(item) {
            return 0;
        }
        let accepted = quantity.min(self.free_space());
        if accepted > 0 {
            self.item = Some(item);
            self.quantity += accepted;
        }
        accepted
    }

    /// Remove up to `quantity`. Returns the amount removed and clears the
    /// item when the node reaches zero.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn withdraw(&mut self, quantity: u32) -> u32 {
        let removed = quantity.min(self.quantity);
        self.quantity -= removed;
        if self.quantity == 0 {
            self.item = None;
        }
        removed
    }

    /// Bind an empty node to an item ahead of a transfer. No-op if the node
    /// already holds something.
    pub fn claim(&mut self, item: ItemId) {
        if self.kind.holds_items() && self.item.is_none() {
            self.item = Some(item);
        }
    }

    /// Enforce `quantity == 0 => item is none`.
    pub fn clear_if_empty(&mut self) {
        if self.quantity == 0 {
            self.item = None;
        }
    }
}

// ---------------------------------------------------------------------------
// Allocation over a machine's node list
// ---------------------------------------------------------------------------

fn stock_nodes(nodes: &[IoNode], direction: NodeDirection) -> impl Iterator<Item = &IoNode> {
    nodes
        .iter()
        .filter(move |n| n.kind.holds_items() && n.direction == direction)
}

/// Summed quantity of `item` across input nodes.
pub fn available(nodes: &[IoNode], item: ItemId) -> u32 {
    stock_nodes(nodes, NodeDirection::Input)
        .map(|n| n.quantity_of(item))
        .sum()
}

/// Deduct `quantity` of `item` from input nodes, first-fit in declaration
/// order. Returns the amount actually deducted; never drives a node below
/// zero.
pub fn deduct(nodes: &mut [IoNode], item: ItemId, quantity: u32) -> u32 {
    let mut remaining = quantity;
    for node in nodes
        .iter_mut()
        .filter(|n| n.kind.holds_items() && n.direction == NodeDirection::Input)
    {
        if remaining == 0 {
            break;
        }
        if node.item() == Some(item) {
            remaining -= node.withdraw(remaining);
        }
    }
    quantity - remaining
}

/// Whether every `(item, quantity)` could be deposited into output nodes at
/// once. Simulates the allocation [`deposit`] would perform, including
/// empty nodes claimed by earlier entries, without touching the nodes.
pub fn output_room_for(nodes: &[IoNode], outputs: &[(ItemId, u32)]) -> bool {
    let mut sim: Vec<(Option<ItemId>, u32, u32)> = stock_nodes(nodes, NodeDirection::Output)
        .map(|n| (n.item(), n.quantity(), n.capacity()))
        .collect();

    for &(item, quantity) in outputs {
        let mut remaining = quantity;
        for (held, qty, cap) in sim.iter_mut() {
            if remaining == 0 {
                break;
            }
            if held.is_some() && *held != Some(item) {
                continue;
            }
            let take = remaining.min(*cap - *qty);
            if take > 0 {
                *held = Some(item);
                *qty += take;
                remaining -= take;
            }
        }
        if remaining > 0 {
            return false;
        }
    }
    true
}

/// Deposit `quantity` of `item` into output nodes: the first node holding
/// `item` or empty with free space, then the next, splitting as needed.
/// Returns the amount that did not fit.
#[must_use = "leftover quantity must be handled (logged or dropped)"]
pub fn deposit(nodes: &mut [IoNode], item: ItemId, quantity: u32) -> u32 {
    let mut remaining = quantity;
    for node in nodes
        .iter_mut()
        .filter(|n| n.kind.holds_items() && n.direction == NodeDirection::Output)
    {
        if remaining == 0 {
            break;
        }
        remaining -= node.insert(item, remaining);
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stone() -> ItemId {
        ItemId(0)
    }
    fn gravel() -> ItemId {
        ItemId(1)
    }
    fn sand() -> ItemId {
        ItemId(2)
    }

    fn node(direction: NodeDirection, capacity: u32) -> IoNode {
        IoNode::new("n", NodeKind::Item, direction, GridPosition::new(0, 0), capacity)
    }

    // -----------------------------------------------------------------------
    // Test 1: insert clamps to capacity and binds the item
    // -----------------------------------------------------------------------
    #[test]
    fn insert_clamps_to_capacity() {
        let mut n = node(NodeDirection::Input, 10);
        assert_eq!(n.insert(stone(), 7), 7);
        assert_eq!(n.insert(stone(), 7), 3);
        assert_eq!(n.quantity(), 10);
        assert_eq!(n.item(), Some(stone()));
    }

    // -----------------------------------------------------------------------
    // Test 2: a node never mixes item kinds
    // -----------------------------------------------------------------------
    #[test]
    fn insert_rejects_different_item() {
        let mut n = node(NodeDirection::Input, 10);
        let _ = n.insert(stone(), 1);
        assert_eq!(n.insert(gravel(), 5), 0);
        assert_eq!(n.quantity(), 1);
    }

    // -----------------------------------------------------------------------
    // Test 3: withdrawing to zero clears the item
    // -----------------------------------------------------------------------
    #[test]
    fn withdraw_to_zero_clears_item() {
        let mut n = node(NodeDirection::Input, 10);
        let _ = n.insert(stone(), 4);
        assert_eq!(n.withdraw(10), 4);
        assert!(n.is_empty());
        assert_eq!(n.item(), None);
    }

    #[test]
    fn energy_nodes_hold_nothing() {
        let mut n = IoNode::new(
            "power",
            NodeKind::Energy,
            NodeDirection::Input,
            GridPosition::new(0, 0),
            16,
        );
        assert_eq!(n.capacity(), 0);
        assert_eq!(n.insert(stone(), 1), 0);
        n.claim(stone());
        assert_eq!(n.item(), None);
    }

    #[test]
    fn claimed_empty_node_is_cleared_by_invariant() {
        let mut n = node(NodeDirection::Output, 5);
        n.claim(gravel());
        assert_eq!(n.item(), Some(gravel()));
        n.clear_if_empty();
        assert_eq!(n.item(), None);
    }

    // -----------------------------------------------------------------------
    // Test 4: availability sums across input nodes only
    // -----------------------------------------------------------------------
    #[test]
    fn available_sums_inputs() {
        let mut nodes = vec![
            node(NodeDirection::Input, 10),
            node(NodeDirection::Input, 10),
            node(NodeDirection::Output, 10),
        ];
        let _ = nodes[0].insert(stone(), 3);
        let _ = nodes[1].insert(stone(), 4);
        let _ = nodes[2].insert(stone(), 9);
        assert_eq!(available(&nodes, stone()), 7);
    }

    // -----------------------------------------------------------------------
    // Test 5: deduction is first-fit and spans nodes
    // -----------------------------------------------------------------------
    #[test]
    fn deduct_first_fit() {
        let mut nodes = vec![node(NodeDirection::Input, 10), node(NodeDirection::Input, 10)];
        let _ = nodes[0].insert(stone(), 3);
        let _ = nodes[1].insert(stone(), 4);
        assert_eq!(deduct(&mut nodes, stone(), 5), 5);
        assert_eq!(nodes[0].quantity(), 0);
        assert_eq!(nodes[0].item(), None);
        assert_eq!(nodes[1].quantity(), 2);
    }

    // -----------------------------------------------------------------------
    // Test 6: output simulation accounts for nodes claimed earlier
    // -----------------------------------------------------------------------
    #[test]
    fn output_room_claims_empty_nodes_in_order() {
        let nodes = vec![node(NodeDirection::Output, 4), node(NodeDirection::Output, 4)];
        // gravel takes the first node, sand the second.
        assert!(output_room_for(&nodes, &[(gravel(), 4), (sand(), 4)]));
        // gravel spills into both, leaving sand nowhere to go.
        assert!(!output_room_for(&nodes, &[(gravel(), 5), (sand(), 1)]));
    }

    #[test]
    fn output_room_respects_existing_items() {
        let mut nodes = vec![node(NodeDirection::Output, 4)];
        let _ = nodes[0].insert(sand(), 1);
        assert!(!output_room_for(&nodes, &[(gravel(), 1)]));
        assert!(output_room_for(&nodes, &[(sand(), 3)]));
        assert!(!output_room_for(&nodes, &[(sand(), 4)]));
    }

    // -----------------------------------------------------------------------
    // Test 7: deposit splits across nodes and reports leftover
    // -----------------------------------------------------------------------
    #[test]
    fn deposit_splits_and_reports_overflow() {
        let mut nodes = vec![node(NodeDirection::Output, 3), node(NodeDirection::Output, 3)];
        assert_eq!(deposit(&mut nodes, gravel(), 8), 2);
        assert_eq!(nodes[0].quantity(), 3);
        assert_eq!(nodes[1].quantity(), 3);
    }

    #[test]
    fn deposit_and_simulation_agree() {
        let mut nodes = vec![node(NodeDirection::Output, 3), node(NodeDirection::Output, 5)];
        let _ = nodes[1].insert(sand(), 2);
        let outputs = [(gravel(), 3), (sand(), 3)];
        assert!(output_room_for(&nodes, &outputs));
        for (item, qty) in outputs {
            assert_eq!(deposit(&mut nodes, item, qty), 0);
        }
        assert_eq!(nodes[1].quantity_of(sand()), 5);
    }
}
