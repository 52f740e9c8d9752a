//! Machine behavior components.
//!
//! A machine owns an ordered `Vec<Component>` built from its archetype's
//! component specs. Dispatch is by enum match (no trait objects, no lookup
//! by name at runtime). Every variant may contribute a runnable condition
//! through [`Component::evaluate_condition`]; variants without one return
//! `None` and are ignored by `Machine::can_run`.

use crate::catalog::{Catalog, ComponentSpec, MachineArchetype};
use crate::id::{ItemId, ResourceNodeId};
use crate::inventory::GlobalInventory;
use crate::machine::Machine;
use crate::node::IoNode;
use crate::power::Voltage;
use crate::recipe::RecipeRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    RecipeRunner(RecipeRunner),
    PowerConsumer(PowerConsumer),
    PowerProducer(PowerProducer),
    Importer(Importer),
    FluidConsumer(FluidConsumer),
    MiningDrill(MiningDrill),
}

impl Component {
    /// Instantiate from an archetype spec. Node names were validated when
    /// the catalog was built. `resource` is the node under a drill.
    pub fn from_spec(
        spec: &ComponentSpec,
        archetype: &MachineArchetype,
        resource: Option<ResourceNodeId>,
    ) -> Self {
        match spec {
            ComponentSpec::RecipeRunner {
                capabilities,
                forced_recipe,
            } => Component::RecipeRunner(RecipeRunner::new(capabilities.clone(), *forced_recipe)),
            ComponentSpec::PowerConsumer {
                watts_required,
                idle_watts,
                voltage,
            } => Component::PowerConsumer(PowerConsumer {
                watts_required: *watts_required,
                idle_watts: *idle_watts,
                voltage: *voltage,
                has_power: false,
                last_demand: 0,
            }),
            ComponentSpec::PowerProducer {
                watts,
                voltage,
                max_buffer,
            } => Component::PowerProducer(PowerProducer {
                watts: *watts,
                voltage: *voltage,
                buffer: 0,
                max_buffer: *max_buffer,
                online: true,
            }),
            ComponentSpec::Importer {
                transfer_ticks,
                transfer_quantity,
                node,
            } => Component::Importer(Importer {
                transfer_ticks: *transfer_ticks,
                transfer_quantity: *transfer_quantity,
                node: archetype.node_index(node),
                progress: 0,
            }),
            ComponentSpec::FluidConsumer {
                fluid,
                consumption_rate,
                node,
            } => Component::FluidConsumer(FluidConsumer {
                fluid: *fluid,
                consumption_rate: *consumption_rate,
                node: archetype.node_index(node),
                satisfied: false,
            }),
            ComponentSpec::MiningDrill {
                ticks_per_cycle,
                quantity,
            } => Component::MiningDrill(MiningDrill {
                ticks_per_cycle: *ticks_per_cycle,
                quantity: *quantity,
                resource,
                progress: 0,
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Component::RecipeRunner(_) => "RecipeRunner",
            Component::PowerConsumer(_) => "PowerConsumer",
            Component::PowerProducer(_) => "PowerProducer",
            Component::Importer(_) => "Importer",
            Component::FluidConsumer(_) => "FluidConsumer",
            Component::MiningDrill(_) => "MiningDrill",
        }
    }

    /// The component's runnable condition, or `None` if it has none.
    /// `require_power = false` suppresses the power consumer's check.
    pub fn evaluate_condition(
        &self,
        machine: &Machine,
        catalog: &Catalog,
        require_power: bool,
    ) -> Option<bool> {
        match self {
            Component::RecipeRunner(runner) => Some(runner.evaluate_condition(machine, catalog)),
            Component::PowerConsumer(consumer) if require_power => Some(consumer.has_power),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Power
// ---------------------------------------------------------------------------

/// Draws from the machine's grid each tick: the full `watts_required` when
/// the machine would otherwise run, `idle_watts` when it would not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerConsumer {
    pub watts_required: u64,
    pub idle_watts: u64,
    pub voltage: Voltage,
    /// Result of this tick's draw; gates the machine's `can_run`.
    pub has_power: bool,
    pub last_demand: u64,
}

impl PowerConsumer {
    pub fn demand(&self, would_run: bool) -> u64 {
        if would_run {
            self.watts_required
        } else {
            self.idle_watts
        }
    }
}

/// Holds an energy buffer that grids drain. Fills from `watts` generation
/// while online and from energy recipes on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerProducer {
    pub watts: u64,
    pub voltage: Voltage,
    pub buffer: u64,
    pub max_buffer: u64,
    pub online: bool,
}

impl PowerProducer {
    /// Free buffer space.
    pub fn room(&self) -> u64 {
        self.max_buffer.saturating_sub(self.buffer)
    }

    /// Add energy, clamped to the buffer. Returns the amount that did not fit.
    #[must_use = "returns the energy that did not fit"]
    pub fn add_energy(&mut self, energy: u64) -> u64 {
        let accepted = energy.min(self.room());
        self.buffer += accepted;
        energy - accepted
    }

    /// Remove up to `energy`. Returns the amount removed.
    pub fn drain(&mut self, energy: u64) -> u64 {
        let taken = energy.min(self.buffer);
        self.buffer -= taken;
        taken
    }

    /// Per-tick generation. Offline producers generate nothing.
    pub fn generate(&mut self, online: bool) {
        self.online = online;
        if online {
            let _ = self.add_energy(self.watts);
        }
    }
}

// ---------------------------------------------------------------------------
// Importer
// ---------------------------------------------------------------------------

/// Ships the contents of one node into the global inventory on an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Importer {
    pub transfer_ticks: u32,
    pub transfer_quantity: u32,
    pub node: Option<usize>,
    pub progress: u32,
}

impl Importer {
    /// Returns what was moved this tick, if anything.
    pub fn tick(
        &mut self,
        nodes: &mut [IoNode],
        inventory: &mut GlobalInventory,
    ) -> Option<(ItemId, u32)> {
        self.progress += 1;
        if self.progress < self.transfer_ticks {
            return None;
        }
        self.progress = 0;

        let node = nodes.get_mut(self.node?)?;
        let item = node.item()?;
        let moved = node.withdraw(self.transfer_quantity);
        if moved == 0 {
            return None;
        }
        inventory.add_item(item, moved as u64);
        Some((item, moved))
    }
}

// ---------------------------------------------------------------------------
// Fluid consumer
// ---------------------------------------------------------------------------

/// Burns a fixed amount of fluid from one node per tick. A machine whose
/// fluid consumer went unsatisfied keeps its power producer offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluidConsumer {
    pub fluid: ItemId,
    pub consumption_rate: u32,
    pub node: Option<usize>,
    pub satisfied: bool,
}

impl FluidConsumer {
    pub fn tick(&mut self, nodes: &mut [IoNode]) {
        let Some(node) = self.node.and_then(|i| nodes.get_mut(i)) else {
            self.satisfied = false;
            return;
        };
        if node.quantity_of(self.fluid) >= self.consumption_rate {
            let _ = node.withdraw(self.consumption_rate);
            self.satisfied = true;
        } else {
            self.satisfied = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Mining drill
// ---------------------------------------------------------------------------

/// Extracts drops from the resource node under the machine. The tick logic
/// lives in the machine because it needs the world's resource arena and RNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningDrill {
    pub ticks_per_cycle: u32,
    pub quantity: u32,
    pub resource: Option<ResourceNodeId>,
    pub progress: u32,
}

impl MiningDrill {
    /// Advance the cycle timer. Returns true when a cycle completes.
    pub fn advance(&mut self) -> bool {
        self.progress += 1;
        if self.progress < self.ticks_per_cycle {
            return false;
        }
        self.progress = 0;
        true
    }
}
