//! Simulation events recorded into a pre-allocated ring buffer.
//!
//! The core never fans events out to subscribers. Components push into the
//! world's [`EventBuffer`] as they act, and the owner drains it explicitly
//! (typically once per tick) with `World::drain_events`. When the buffer is
//! full the oldest event is overwritten and counted as dropped.

use crate::fixed::Ticks;
use crate::id::*;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A simulation event. All events carry the tick at which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    // -- Recipes --
    RecipeStarted {
        machine: MachineId,
        recipe: RecipeId,
        tick: Ticks,
    },
    RecipeCompleted {
        machine: MachineId,
        recipe: RecipeId,
        tick: Ticks,
    },
    RecipeInterrupted {
        machine: MachineId,
        recipe: RecipeId,
        tick: Ticks,
    },
    /// Output could not be stored at completion and was discarded.
    /// `item` is `None` for energy.
    OutputOverflow {
        machine: MachineId,
        item: Option<ItemId>,
        dropped: u64,
        tick: Ticks,
    },

    // -- Logistics --
    ItemsTransferred {
        root: LinkId,
        item: ItemId,
        quantity: u32,
        hops: u32,
        tick: Ticks,
    },
    ItemsImported {
        machine: MachineId,
        item: ItemId,
        quantity: u32,
        tick: Ticks,
    },
    ResourceMined {
        machine: MachineId,
        resource: ResourceNodeId,
        item: ItemId,
        quantity: u32,
        tick: Ticks,
    },

    // -- Power --
    GridRebuilt {
        grid: GridId,
        cables: u32,
        machines: u32,
        tick: Ticks,
    },
}

impl SimEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            SimEvent::RecipeStarted { tick, .. }
            | SimEvent::RecipeCompleted { tick, .. }
            | SimEvent::RecipeInterrupted { tick, .. }
            | SimEvent::OutputOverflow { tick, .. }
            | SimEvent::ItemsTransferred { tick, .. }
            | SimEvent::ItemsImported { tick, .. }
            | SimEvent::ResourceMined { tick, .. }
            | SimEvent::GridRebuilt { tick, .. } => *tick,
        }
    }
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

/// Fixed-capacity ring buffer of events.
#[derive(Debug)]
pub struct EventBuffer {
    events: Vec<Option<SimEvent>>,
    /// Write position (wraps around).
    head: usize,
    len: usize,
    /// Total events ever written (including overwritten ones).
    total_written: u64,
    /// Events overwritten before being drained.
    dropped: u64,
}

impl EventBuffer {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    /// Push an event. If full, the oldest event is dropped.
    pub fn push(&mut self, event: SimEvent) {
        if self.len == self.capacity() {
            self.dropped += 1;
        }
        self.events[self.head] = Some(event);
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Number of events overwritten because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    fn oldest_index(&self) -> usize {
        (self.head + self.capacity() - self.len) % self.capacity()
    }

    /// Iterate from oldest to newest without removing.
    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> + '_ {
        let start = self.oldest_index();
        (0..self.len).filter_map(move |i| self.events[(start + i) % self.capacity()].as_ref())
    }

    /// Remove and return all events, oldest first.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        let start = self.oldest_index();
        let capacity = self.capacity();
        let out = (0..self.len)
            .filter_map(|i| self.events[(start + i) % capacity].take())
            .collect();
        self.head = 0;
        self.len = 0;
        out
    }
}
