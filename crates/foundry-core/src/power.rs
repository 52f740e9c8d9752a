//! Power cables and grids.
//!
//! Cables are plain segments between two positions. Cables sharing an
//! endpoint are `connected`; a connected component of same-voltage cables
//! shares one [`PowerGrid`]. Grids are never patched: whenever topology
//! changes the affected cables are marked dirty, and the next
//! [`CableNetwork::refresh`] replaces the whole component's grid with a
//! fresh one built by BFS.
//!
//! A grid's `available_wattage` is the sum of its producers' buffers at the
//! last grid tick, minus what consumers have drawn since. Consumers draw
//! through [`PowerGrid::draw_power`], which depletes producer buffers in
//! connection order.

use crate::event::{EventBuffer, SimEvent};
use crate::fixed::Ticks;
use crate::id::{CableId, GridId, LinkTypeId, MachineId};
use crate::machine::Machine;
use crate::spatial::{GridPosition, SpatialIoRegistry};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashSet, VecDeque};

// ---------------------------------------------------------------------------
// Voltage
// ---------------------------------------------------------------------------

/// Voltage tier. Cables only join grids of their own tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Voltage {
    #[default]
    #[serde(rename = "LV")]
    Lv,
    #[serde(rename = "MV")]
    Mv,
    #[serde(rename = "HV")]
    Hv,
    #[serde(rename = "EHV")]
    Ehv,
    #[serde(rename = "UHV")]
    Uhv,
}

// ---------------------------------------------------------------------------
// Cable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerCable {
    pub start: GridPosition,
    pub end: GridPosition,
    pub archetype: LinkTypeId,
    pub voltage: Voltage,
    /// Grid membership must be recomputed before the next grid tick.
    pub dirty: bool,
    /// Cables sharing an endpoint with this one, any voltage.
    pub connected: Vec<CableId>,
    pub grid: Option<GridId>,
}

impl PowerCable {
    pub fn new(
        start: GridPosition,
        end: GridPosition,
        archetype: LinkTypeId,
        voltage: Voltage,
    ) -> Self {
        Self {
            start,
            end,
            archetype,
            voltage,
            dirty: true,
            connected: Vec::new(),
            grid: None,
        }
    }

    pub fn endpoints(&self) -> [GridPosition; 2] {
        [self.start, self.end]
    }
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerGrid {
    pub voltage: Voltage,
    /// Machines with a producer or consumer, in discovery order.
    pub connections: Vec<MachineId>,
    pub cables: Vec<CableId>,
    pub available_wattage: u64,
    /// Ticks since the last successful draw, saturating.
    pub idle_ticks: u32,
}

impl PowerGrid {
    pub fn new(voltage: Voltage) -> Self {
        Self {
            voltage,
            connections: Vec::new(),
            cables: Vec::new(),
            available_wattage: 0,
            idle_ticks: 0,
        }
    }

    fn add_machine(&mut self, machine: MachineId) {
        if !self.connections.contains(&machine) {
            self.connections.push(machine);
        }
    }

    /// Sum of the buffers of this grid's same-voltage producers.
    fn supply(&self, machines: &SlotMap<MachineId, Machine>) -> u64 {
        self.connections
            .iter()
            .filter_map(|id| machines.get(*id))
            .filter_map(|m| m.supplier(self.voltage))
            .map(|p| p.buffer)
            .fold(0u64, u64::saturating_add)
    }

    /// Recompute `available_wattage` from the producers' buffers.
    pub fn tick(&mut self, machines: &SlotMap<MachineId, Machine>, recency_cap: u32) {
        self.available_wattage = self.supply(machines);
        self.idle_ticks = self.idle_ticks.saturating_add(1).min(recency_cap);
    }

    /// Sufficiency check without mutating. A voltage mismatch always fails.
    pub fn can_supply_wattage(&self, watts: u64, voltage: Voltage) -> bool {
        voltage == self.voltage && self.available_wattage >= watts
    }

    /// Remove `watts` from the producers' buffers, first producer first.
    /// Changes nothing and returns false when either the cached total or
    /// the buffers themselves cannot cover it.
    pub fn draw_power(&mut self, watts: u64, machines: &mut SlotMap<MachineId, Machine>) -> bool {
        if self.available_wattage < watts || self.supply(machines) < watts {
            return false;
        }
        let mut remaining = watts;
        for id in &self.connections {
            if remaining == 0 {
                break;
            }
            if let Some(producer) = machines
                .get_mut(*id)
                .and_then(Machine::producer_mut)
                .filter(|p| p.voltage == self.voltage)
            {
                remaining -= producer.drain(remaining);
            }
        }
        self.available_wattage -= watts;
        self.idle_ticks = 0;
        true
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Every cable and grid in the world plus the position index for cables.
#[derive(Debug, Default)]
pub struct CableNetwork {
    cables: SlotMap<CableId, PowerCable>,
    grids: SlotMap<GridId, PowerGrid>,
    by_position: BTreeMap<GridPosition, Vec<CableId>>,
    /// Set by `remove_cable` so the next refresh sweeps grids it emptied.
    removed: bool,
}

impl CableNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a cable, connect it to every cable sharing either endpoint and
    /// mark it dirty. The grid is built on the next refresh.
    pub fn add_cable(&mut self, cable: PowerCable) -> CableId {
        let endpoints = cable.endpoints();
        let id = self.cables.insert(cable);

        let mut neighbours: Vec<CableId> = Vec::new();
        for pos in endpoints {
            for other in self.by_position.get(&pos).into_iter().flatten() {
                if *other != id && !neighbours.contains(other) {
                    neighbours.push(*other);
                }
            }
        }
        for other in &neighbours {
            if let Some(c) = self.cables.get_mut(*other) {
                c.connected.push(id);
            }
        }
        if let Some(c) = self.cables.get_mut(id) {
            c.connected = neighbours;
        }
        for pos in endpoints {
            let entry = self.by_position.entry(pos).or_default();
            if !entry.contains(&id) {
                entry.push(id);
            }
        }
        id
    }

    /// Remove a cable and mark its former neighbours dirty. A grid left
    /// without cables is destroyed on the next refresh. Removing an unknown
    /// cable is a registry consistency error: logged, not fatal.
    pub fn remove_cable(&mut self, id: CableId) -> Option<PowerCable> {
        let Some(cable) = self.cables.remove(id) else {
            tracing::warn!(cable = ?id, "removing a cable that is not registered");
            return None;
        };
        for pos in cable.endpoints() {
            if let Some(list) = self.by_position.get_mut(&pos) {
                list.retain(|c| *c != id);
                if list.is_empty() {
                    self.by_position.remove(&pos);
                }
            }
        }
        for other in &cable.connected {
            if let Some(c) = self.cables.get_mut(*other) {
                c.connected.retain(|n| *n != id);
                c.dirty = true;
            }
        }
        if let Some(g) = cable.grid.and_then(|g| self.grids.get_mut(g)) {
            g.cables.retain(|c| *c != id);
        }
        self.removed = true;
        Some(cable)
    }

    /// Mark every cable with an endpoint at `pos` dirty.
    pub fn mark_dirty_at(&mut self, pos: GridPosition) {
        for id in self.by_position.get(&pos).into_iter().flatten() {
            if let Some(c) = self.cables.get_mut(*id) {
                c.dirty = true;
            }
        }
    }

    /// Drop `machine` from whatever grid lists it.
    pub fn detach_machine(&mut self, machine: MachineId, grid: Option<GridId>) {
        if let Some(g) = grid.and_then(|g| self.grids.get_mut(g)) {
            g.connections.retain(|m| *m != machine);
        }
    }

    /// Rebuild the grid of every dirty cable's component, destroy grids no
    /// cable references any more, then tick every live grid once.
    /// Returns the ids of the freshly built grids.
    pub fn refresh(
        &mut self,
        io: &SpatialIoRegistry,
        machines: &mut SlotMap<MachineId, Machine>,
        recency_cap: u32,
        events: &mut EventBuffer,
        tick: Ticks,
    ) -> Vec<GridId> {
        let dirty: Vec<CableId> = self
            .cables
            .iter()
            .filter(|(_, c)| c.dirty)
            .map(|(id, _)| id)
            .collect();

        let mut rebuilt = Vec::new();
        for seed in dirty {
            // Already swept up by an earlier rebuild this pass.
            if !self.cables.get(seed).is_some_and(|c| c.dirty) {
                continue;
            }
            let grid = self.rebuild_from(seed, io, machines);
            if let Some(g) = self.grids.get(grid) {
                tracing::debug!(
                    grid = ?grid,
                    voltage = ?g.voltage,
                    cables = g.cables.len(),
                    machines = g.connections.len(),
                    "power grid rebuilt"
                );
                events.push(SimEvent::GridRebuilt {
                    grid,
                    cables: g.cables.len() as u32,
                    machines: g.connections.len() as u32,
                    tick,
                });
            }
            rebuilt.push(grid);
        }

        if std::mem::take(&mut self.removed) || !rebuilt.is_empty() {
            self.collect_orphan_grids(machines);
        }

        for grid in self.grids.values_mut() {
            grid.tick(machines, recency_cap);
        }
        rebuilt
    }

    fn rebuild_from(
        &mut self,
        seed: CableId,
        io: &SpatialIoRegistry,
        machines: &mut SlotMap<MachineId, Machine>,
    ) -> GridId {
        let voltage = self.cables.get(seed).map(|c| c.voltage).unwrap_or_default();
        let mut grid = PowerGrid::new(voltage);
        let mut visited: HashSet<CableId> = HashSet::new();
        let mut queue = VecDeque::from([seed]);
        visited.insert(seed);

        while let Some(id) = queue.pop_front() {
            let Some(cable) = self.cables.get(id) else {
                continue;
            };
            grid.cables.push(id);
            for pos in cable.endpoints() {
                let Some(node) = io.energy_node_at(pos) else {
                    continue;
                };
                if machines
                    .get(node.machine)
                    .is_some_and(|m| m.joins_grid(voltage))
                {
                    grid.add_machine(node.machine);
                }
            }
            for next in &cable.connected {
                let same_voltage = self.cables.get(*next).is_some_and(|c| c.voltage == voltage);
                if same_voltage && visited.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }

        let cables = grid.cables.clone();
        let members = grid.connections.clone();
        let grid_id = self.grids.insert(grid);
        for id in cables {
            if let Some(c) = self.cables.get_mut(id) {
                c.grid = Some(grid_id);
                c.dirty = false;
            }
        }
        for m in members {
            if let Some(machine) = machines.get_mut(m) {
                machine.grid = Some(grid_id);
            }
        }
        grid_id
    }

    fn collect_orphan_grids(&mut self, machines: &mut SlotMap<MachineId, Machine>) {
        let live: HashSet<GridId> = self.cables.values().filter_map(|c| c.grid).collect();
        let dead: Vec<GridId> = self
            .grids
            .keys()
            .filter(|g| !live.contains(g))
            .collect();
        if dead.is_empty() {
            return;
        }
        for g in &dead {
            self.grids.remove(*g);
        }
        for machine in machines.values_mut() {
            if machine.grid.is_some_and(|g| dead.contains(&g)) {
                machine.grid = None;
            }
        }
    }

    // -- Queries --

    pub fn cable(&self, id: CableId) -> Option<&PowerCable> {
        self.cables.get(id)
    }

    pub fn grid(&self, id: GridId) -> Option<&PowerGrid> {
        self.grids.get(id)
    }

    pub fn grid_mut(&mut self, id: GridId) -> Option<&mut PowerGrid> {
        self.grids.get_mut(id)
    }

    pub fn cables(&self) -> impl Iterator<Item = (CableId, &PowerCable)> {
        self.cables.iter()
    }

    pub fn grids(&self) -> impl Iterator<Item = (GridId, &PowerGrid)> {
        self.grids.iter()
    }

    pub fn cables_at(&self, pos: GridPosition) -> &[CableId] {
        self.by_position.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cable_count(&self) -> usize {
        self.cables.len()
    }

    pub fn grid_count(&self) -> usize {
        self.grids.len()
    }

    pub fn has_dirty(&self) -> bool {
        self.cables.values().any(|c| c.dirty)
    }
}
