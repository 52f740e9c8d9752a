//! Resource nodes: ore patches that drills and manual harvesting draw from.
//!
//! Read-only during a tick except for the depletion counter.

use crate::catalog::ResourceArchetype;
use crate::fixed::Fixed64;
use crate::id::{ItemId, ResourceTypeId};
use crate::rng::SimRng;
use crate::spatial::GridPosition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    pub archetype: ResourceTypeId,
    /// Top-left tile.
    pub position: GridPosition,
    pub size: (u32, u32),
    /// `None` never depletes.
    pub remaining: Option<u64>,
    /// Total units extracted so far.
    pub extracted: u64,
}

impl ResourceNode {
    pub fn new(archetype: ResourceTypeId, def: &ResourceArchetype, position: GridPosition) -> Self {
        Self {
            archetype,
            position,
            size: def.size,
            remaining: def.amount,
            extracted: 0,
        }
    }

    /// Whether `tile` lies inside the node's area.
    pub fn covers(&self, tile: GridPosition) -> bool {
        let dx = tile.x - self.position.x;
        let dy = tile.y - self.position.y;
        dx >= 0 && dy >= 0 && (dx as u32) < self.size.0 && (dy as u32) < self.size.1
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Units available for a request of `quantity`.
    pub fn available(&self, quantity: u32) -> u32 {
        match self.remaining {
            Some(left) => quantity.min(left.min(u32::MAX as u64) as u32),
            None => quantity,
        }
    }

    /// Record an extraction. Callers pass at most [`available`](Self::available).
    pub fn extract(&mut self, quantity: u32) {
        if let Some(left) = self.remaining.as_mut() {
            *left = left.saturating_sub(quantity as u64);
        }
        self.extracted += quantity as u64;
    }
}

/// Weighted pick from a drop table.
pub fn roll_drop(def: &ResourceArchetype, rng: &mut SimRng) -> Option<ItemId> {
    let weights: Vec<Fixed64> = def.drop_table.iter().map(|(_, w)| *w).collect();
    rng.pick_weighted(&weights).map(|i| def.drop_table[i].0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archetype(amount: Option<u64>) -> ResourceArchetype {
        ResourceArchetype {
            key: "stone_patch".into(),
            size: (2, 3),
            drop_table: vec![(ItemId(0), Fixed64::from_num(1))],
            amount,
        }
    }

    #[test]
    fn covers_its_area_only() {
        let node = ResourceNode::new(ResourceTypeId(0), &archetype(None), GridPosition::new(4, 4));
        assert!(node.covers(GridPosition::new(4, 4)));
        assert!(node.covers(GridPosition::new(5, 6)));
        assert!(!node.covers(GridPosition::new(6, 4)));
        assert!(!node.covers(GridPosition::new(4, 7)));
        assert!(!node.covers(GridPosition::new(3, 4)));
    }

    #[test]
    fn finite_node_depletes() {
        let mut node =
            ResourceNode::new(ResourceTypeId(0), &archetype(Some(3)), GridPosition::new(0, 0));
        assert_eq!(node.available(2), 2);
        node.extract(2);
        assert_eq!(node.available(2), 1);
        node.extract(1);
        assert!(node.is_depleted());
        assert_eq!(node.available(5), 0);
        assert_eq!(node.extracted, 3);
    }

    #[test]
    fn infinite_node_never_depletes() {
        let mut node = ResourceNode::new(ResourceTypeId(0), &archetype(None), GridPosition::new(0, 0));
        node.extract(1_000);
        assert!(!node.is_depleted());
        assert_eq!(node.available(7), 7);
    }

    #[test]
    fn single_entry_table_always_rolls_it() {
        let def = archetype(None);
        let mut rng = SimRng::new(3);
        for _ in 0..20 {
            assert_eq!(roll_drop(&def, &mut rng), Some(ItemId(0)));
        }
    }
}
