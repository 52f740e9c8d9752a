//! Simulation Scheduler: fixed-timestep tick driver and phase ordering.
//!
//! `update(delta_seconds)` accumulates wall-clock time in Q32.32 and runs
//! one tick per whole tick period held in the accumulator, subtracting the
//! period each time so no time is lost. At most `max_ticks_per_update`
//! ticks run per call; the rest stays in the accumulator.
//!
//! # Phase order
//!
//! Each tick runs:
//! 1. **Link reset** -- clear every link's "used this tick" mark
//! 2. **Producers** -- machines with a power producer
//! 3. **Grids** -- rebuild dirty cable components, tick every grid
//! 4. **Consumers** -- machines with a power consumer not yet ticked
//! 5. **Machines** -- every remaining machine
//! 6. **Links** -- root links attempt transfers
//! 7. **Catch-all** -- anything still unticked (reported; should be empty)

use crate::config::SimConfig;
use crate::entity::MachineClass;
use crate::fixed::{Fixed64, Ticks};
use crate::id::MachineId;
use crate::world::World;
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What one tick did, phase by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// The tick number this report describes.
    pub tick: Ticks,
    pub producers: u32,
    pub grids_rebuilt: u32,
    pub consumers: u32,
    pub machines: u32,
    pub link_roots: u32,
    pub transfers: u32,
    /// Entities that reached the catch-all phase.
    pub unticked: u32,
}

/// Result of a [`Scheduler::update`] call.
#[derive(Debug, Default)]
pub struct AdvanceResult {
    /// Number of ticks actually executed.
    pub steps_run: u32,
    /// One report per executed tick.
    pub reports: Vec<TickReport>,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// FNV-1a hasher used to fingerprint world state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Fixed64,
    max_ticks_per_update: u32,
    accumulator: Fixed64,
    /// Wall-clock time into the current TPS window.
    window: Fixed64,
    ticks_in_window: u32,
    measured_tps: u32,
}

impl Scheduler {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            period: Fixed64::ONE / Fixed64::from_num(config.tick_rate()),
            max_ticks_per_update: config.max_ticks_per_update.max(1),
            accumulator: Fixed64::ZERO,
            window: Fixed64::ZERO,
            ticks_in_window: 0,
            measured_tps: 0,
        }
    }

    /// Seconds per tick.
    pub fn tick_period(&self) -> Fixed64 {
        self.period
    }

    /// Unspent time carried to the next update.
    pub fn accumulator(&self) -> Fixed64 {
        self.accumulator
    }

    /// Ticks executed during the last complete one-second window.
    pub fn measured_tps(&self) -> u32 {
        self.measured_tps
    }

    /// Accumulate `delta_seconds` and run every tick it pays for, up to the
    /// per-update cap. Negative deltas count as zero.
    pub fn update(&mut self, world: &mut World, delta_seconds: Fixed64) -> AdvanceResult {
        let delta = delta_seconds.max(Fixed64::ZERO);
        self.accumulator = self.accumulator.saturating_add(delta);

        self.window = self.window.saturating_add(delta);
        if self.window >= Fixed64::ONE {
            self.measured_tps = self.ticks_in_window;
            self.ticks_in_window = 0;
            // Long stalls skip whole windows.
            self.window = self.window.frac();
        }

        let mut result = AdvanceResult::default();
        while self.accumulator >= self.period && result.steps_run < self.max_ticks_per_update {
            self.accumulator -= self.period;
            result.reports.push(self.tick(world));
            result.steps_run += 1;
        }
        result
    }

    /// Run exactly one tick through every phase.
    pub fn tick(&mut self, world: &mut World) -> TickReport {
        let mut report = TickReport {
            tick: world.tick(),
            ..TickReport::default()
        };
        let mut ticked: HashSet<MachineId> = HashSet::new();

        // Phase 1: Link reset.
        world.reset_link_usage();

        // Phase 2: Producers.
        for id in world.entities.machines_of(MachineClass::Producer) {
            if world.tick_machine(id) {
                ticked.insert(id);
                report.producers += 1;
            }
        }

        // Phase 3: Grids.
        report.grids_rebuilt = world.refresh_power() as u32;

        // Phase 4: Consumers.
        for id in world.entities.machines_of(MachineClass::Consumer) {
            if !ticked.contains(&id) && world.tick_machine(id) {
                ticked.insert(id);
                report.consumers += 1;
            }
        }

        // Phase 5: Remaining machines.
        for id in world.entities.machines_of(MachineClass::Plain) {
            if !ticked.contains(&id) && world.tick_machine(id) {
                ticked.insert(id);
                report.machines += 1;
            }
        }

        // Phase 6: Links.
        let links = world.tick_links();
        report.link_roots = links.roots;
        report.transfers = links.transfers;

        // Phase 7: Catch-all.
        for id in world.entities.machine_ids() {
            if ticked.contains(&id) {
                continue;
            }
            tracing::warn!(machine = ?id, tick = report.tick, "machine reached the catch-all phase");
            world.tick_machine(id);
            report.unticked += 1;
        }

        world.finish_tick();
        self.ticks_in_window += 1;
        report
    }
}
