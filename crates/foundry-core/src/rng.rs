//! Deterministic PRNG for simulation use (drill drop tables, manual harvest).
//!
//! Uses the SplitMix64 algorithm: 8 bytes of state, good statistical
//! properties, identical output on every platform.

use crate::fixed::Fixed64;

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Pick an index into `weights` with probability proportional to its
    /// weight. Non-positive weights are never picked. Returns `None` when no
    /// weight is positive.
    pub fn pick_weighted(&mut self, weights: &[Fixed64]) -> Option<usize> {
        let total = weights
            .iter()
            .filter(|w| **w > Fixed64::ZERO)
            .fold(Fixed64::ZERO, |acc, w| acc.saturating_add(*w));
        if total <= Fixed64::ZERO {
            return None;
        }

        // Scale a uniform 32-bit fraction into [0, total).
        let fraction = Fixed64::from_bits((self.next_u64() >> 32) as i64);
        let mut roll = fraction.saturating_mul(total);

        let mut last_positive = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= Fixed64::ZERO {
                continue;
            }
            if roll < *w {
                return Some(i);
            }
            roll -= *w;
            last_positive = Some(i);
        }
        // Rounding can leave a sliver past the final bucket.
        last_positive
    }

    /// Get the internal state (for hashing).
    pub fn state(&self) -> u64 {
        self.state
    }
}
