use crate::id::ItemId;
use std::collections::BTreeMap;

/// Player-wide stock fed by importers and manual harvesting.
///
/// Keyed by `BTreeMap` so iteration (and the state hash) is ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalInventory {
    items: BTreeMap<ItemId, u64>,
}

impl GlobalInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, item: ItemId, quantity: u64) {
        if quantity == 0 {
            return;
        }
        *self.items.entry(item).or_insert(0) += quantity;
    }

    /// Remove up to `quantity`. Returns the shortfall (0 when fully covered).
    #[must_use = "returns how much could not be removed"]
    pub fn remove_item(&mut self, item: ItemId, quantity: u64) -> u64 {
        let Some(held) = self.items.get_mut(&item) else {
            return quantity;
        };
        let taken = quantity.min(*held);
        *held -= taken;
        if *held == 0 {
            self.items.remove(&item);
        }
        quantity - taken
    }

    pub fn get_item(&self, item: ItemId) -> u64 {
        self.items.get(&item).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemId, u64)> + '_ {
        self.items.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
