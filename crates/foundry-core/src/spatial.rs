//! Spatial I/O registry: position lookups for machines and their nodes.
//!
//! Links and cables never hold references to machines. They carry plain
//! [`GridPosition`] endpoints and resolve whatever is plugged in at those
//! positions through this registry each time they need it.
//!
//! Three position tables are kept:
//! - `tiles`: footprint tile -> occupying machine
//! - `item_nodes`: position -> item or fluid node
//! - `energy_nodes`: position -> energy node
//!
//! An item node and an energy node may share a position; two nodes of the
//! same table may not.

use crate::id::{MachineId, NodeRef};
use crate::node::NodeKind;
use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A tile position on the 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Translate by a tile offset.
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

/// Rotation applied to a placed machine. Screen coordinates: +y points down,
/// so a clockwise quarter turn maps east `(1, 0)` to south `(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// All four rotation values.
    pub fn all() -> [Rotation; 4] {
        [
            Rotation::None,
            Rotation::Cw90,
            Rotation::Cw180,
            Rotation::Cw270,
        ]
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Rotation::None => Rotation::Cw90,
            Rotation::Cw90 => Rotation::Cw180,
            Rotation::Cw180 => Rotation::Cw270,
            Rotation::Cw270 => Rotation::None,
        }
    }

    fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }

    /// Rotate an integer tile offset about the origin.
    pub fn apply(self, (x, y): (i32, i32)) -> (i32, i32) {
        let mut p = (x, y);
        for _ in 0..self.quarter_turns() {
            p = (-p.1, p.0);
        }
        p
    }

    /// Rotate a fractional node offset about the origin.
    pub fn apply_fixed(self, (x, y): (Fixed64, Fixed64)) -> (Fixed64, Fixed64) {
        let mut p = (x, y);
        for _ in 0..self.quarter_turns() {
            p = (-p.1, p.0);
        }
        p
    }
}

/// Errors from spatial registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpatialError {
    #[error("tile ({}, {}) is occupied", .0.x, .0.y)]
    Occupied(GridPosition),
    #[error("an I/O node is already registered at ({}, {})", .0.x, .0.y)]
    NodeOccupied(GridPosition),
}

/// One node a machine wants registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodePlacement {
    pub position: GridPosition,
    pub kind: NodeKind,
    pub node: NodeRef,
}

// ---------------------------------------------------------------------------
// SpatialIoRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SpatialIoRegistry {
    tiles: BTreeMap<GridPosition, MachineId>,
    item_nodes: BTreeMap<GridPosition, NodeRef>,
    energy_nodes: BTreeMap<GridPosition, NodeRef>,
}

impl SpatialIoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: NodeKind) -> &BTreeMap<GridPosition, NodeRef> {
        match kind {
            NodeKind::Energy => &self.energy_nodes,
            NodeKind::Item | NodeKind::Fluid => &self.item_nodes,
        }
    }

    fn table_mut(&mut self, kind: NodeKind) -> &mut BTreeMap<GridPosition, NodeRef> {
        match kind {
            NodeKind::Energy => &mut self.energy_nodes,
            NodeKind::Item | NodeKind::Fluid => &mut self.item_nodes,
        }
    }

    // -- Placement --

    /// Check that every tile and node position is free, including against
    /// the candidate's own entries.
    pub fn check_free(
        &self,
        tiles: &[GridPosition],
        nodes: &[NodePlacement],
    ) -> Result<(), SpatialError> {
        for (i, tile) in tiles.iter().enumerate() {
            if self.tiles.contains_key(tile) || tiles[..i].contains(tile) {
                return Err(SpatialError::Occupied(*tile));
            }
        }
        for (i, placement) in nodes.iter().enumerate() {
            let clash_internal = nodes[..i].iter().any(|other| {
                other.position == placement.position
                    && (other.kind == NodeKind::Energy) == (placement.kind == NodeKind::Energy)
            });
            if clash_internal || self.table(placement.kind).contains_key(&placement.position) {
                return Err(SpatialError::NodeOccupied(placement.position));
            }
        }
        Ok(())
    }

    /// Register a machine's footprint and nodes. Nothing is written unless
    /// every position is free.
    pub fn register_machine(
        &mut self,
        machine: MachineId,
        tiles: &[GridPosition],
        nodes: &[NodePlacement],
    ) -> Result<(), SpatialError> {
        self.check_free(tiles, nodes)?;
        for tile in tiles {
            self.tiles.insert(*tile, machine);
        }
        for placement in nodes {
            self.table_mut(placement.kind)
                .insert(placement.position, placement.node);
        }
        Ok(())
    }

    /// Remove a machine's footprint and nodes. Entries that now belong to a
    /// different machine are left alone.
    pub fn unregister_machine(
        &mut self,
        machine: MachineId,
        tiles: &[GridPosition],
        nodes: &[NodePlacement],
    ) {
        for tile in tiles {
            if self.tiles.get(tile) == Some(&machine) {
                self.tiles.remove(tile);
            }
        }
        for placement in nodes {
            let table = self.table_mut(placement.kind);
            if table.get(&placement.position).map(|n| n.machine) == Some(machine) {
                table.remove(&placement.position);
            }
        }
    }

    // -- Queries --

    /// The item or fluid node at a position.
    pub fn item_node_at(&self, position: GridPosition) -> Option<NodeRef> {
        self.item_nodes.get(&position).copied()
    }

    /// The energy node at a position.
    pub fn energy_node_at(&self, position: GridPosition) -> Option<NodeRef> {
        self.energy_nodes.get(&position).copied()
    }

    /// The machine whose footprint covers a tile.
    pub fn machine_at(&self, position: GridPosition) -> Option<MachineId> {
        self.tiles.get(&position).copied()
    }

    pub fn is_tile_occupied(&self, position: GridPosition) -> bool {
        self.tiles.contains_key(&position)
    }

    pub fn occupied_tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn node_count(&self) -> usize {
        self.item_nodes.len() + self.energy_nodes.len()
    }
}
