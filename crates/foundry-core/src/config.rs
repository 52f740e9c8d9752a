//! Simulation tuning knobs.
//!
//! Every field has a default so a content directory may omit the
//! `simulation` file entirely or list only the values it overrides.

use serde::{Deserialize, Serialize};

/// Upper bound for the link and grid recency counters ("ticks since last
/// transfer" / "ticks since last draw"). Counters saturate here.
pub const DEFAULT_RECENCY_CAP: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed tick rate the scheduler converts wall-clock time into.
    pub ticks_per_second: u32,
    /// Most ticks a single `update` call may run. Time beyond that stays in
    /// the accumulator for the next call.
    pub max_ticks_per_update: u32,
    /// Saturation point for recency counters.
    pub recency_cap: u32,
    /// Capacity of the world's event ring buffer.
    pub event_capacity: usize,
    /// Seed for the world RNG (drill drop tables).
    pub rng_seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
            max_ticks_per_update: 8,
            recency_cap: DEFAULT_RECENCY_CAP,
            event_capacity: 1024,
            rng_seed: 0,
        }
    }
}

impl SimConfig {
    /// Tick rate clamped to at least one tick per second.
    pub fn tick_rate(&self) -> u32 {
        self.ticks_per_second.max(1)
    }
}
