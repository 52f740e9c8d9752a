//! Machines: placed archetype instances owning their I/O nodes and
//! components.
//!
//! A machine ticks its components in archetype declaration order and then
//! clears the item of every node that reached zero. The power consumer is
//! the one component whose tick reaches outside the machine (it drains
//! producers on other machines), so the world drives that step; every other
//! component ticks through [`Machine::tick_component`].

use crate::catalog::{Catalog, MachineArchetype, OutputKind, RecipeDef};
use crate::component::{Component, MiningDrill, PowerConsumer, PowerProducer};
use crate::event::{EventBuffer, SimEvent};
use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use crate::inventory::GlobalInventory;
use crate::node::{self, IoNode};
use crate::power::Voltage;
use crate::recipe::RecipeRunner;
use crate::resource::{self, ResourceNode};
use crate::rng::SimRng;
use crate::spatial::{GridPosition, NodePlacement, Rotation};
use crate::world::SimError;
use slotmap::SlotMap;

/// Everything outside the machine that a component tick may touch.
pub struct MachineContext<'a> {
    pub id: MachineId,
    pub catalog: &'a Catalog,
    pub inventory: &'a mut GlobalInventory,
    pub resources: &'a mut SlotMap<ResourceNodeId, ResourceNode>,
    pub rng: &'a mut SimRng,
    pub events: &'a mut EventBuffer,
    pub tick: Ticks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    pub archetype: MachineTypeId,
    /// Anchor tile.
    pub position: GridPosition,
    pub rotation: Rotation,
    /// Absolute footprint tiles.
    pub tiles: Vec<GridPosition>,
    /// Nodes in archetype declaration order.
    pub nodes: Vec<IoNode>,
    /// Components in archetype declaration order.
    pub components: Vec<Component>,
    pub enabled: bool,
    /// Grid this machine is attached to; maintained by grid rebuilds.
    pub grid: Option<GridId>,
}

/// Absolute footprint of an archetype placed at `position`.
pub fn footprint_tiles(
    archetype: &MachineArchetype,
    position: GridPosition,
    rotation: Rotation,
) -> Vec<GridPosition> {
    archetype
        .footprint
        .iter()
        .map(|&offset| {
            let (dx, dy) = rotation.apply(offset);
            position.offset(dx, dy)
        })
        .collect()
}

fn round_to_tile(v: Fixed64) -> i32 {
    v.round().saturating_to_num::<i32>()
}

impl Machine {
    pub fn new(
        archetype_id: MachineTypeId,
        archetype: &MachineArchetype,
        position: GridPosition,
        rotation: Rotation,
        resource: Option<ResourceNodeId>,
    ) -> Self {
        let (cx, cy) = rotation.apply(archetype.center);
        let center = position.offset(cx, cy);
        let nodes = archetype
            .nodes
            .iter()
            .map(|desc| {
                let (ox, oy) = rotation.apply_fixed(desc.offset);
                let at = center.offset(round_to_tile(ox), round_to_tile(oy));
                IoNode::new(desc.id.clone(), desc.kind, desc.direction, at, desc.capacity)
            })
            .collect();
        let components = archetype
            .components
            .iter()
            .map(|spec| Component::from_spec(spec, archetype, resource))
            .collect();

        Self {
            archetype: archetype_id,
            position,
            rotation,
            tiles: footprint_tiles(archetype, position, rotation),
            nodes,
            components,
            enabled: true,
            grid: None,
        }
    }

    /// Registry entries for every node of this machine.
    pub fn placements(&self, id: MachineId) -> Vec<NodePlacement> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, n)| NodePlacement {
                position: n.position,
                kind: n.kind,
                node: NodeRef::new(id, index),
            })
            .collect()
    }

    /// Positions of the machine's energy nodes.
    pub fn energy_positions(&self) -> impl Iterator<Item = GridPosition> + '_ {
        self.nodes
            .iter()
            .filter(|n| !n.kind.holds_items())
            .map(|n| n.position)
    }

    // -- Lookups --

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&IoNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut IoNode> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    pub fn runner(&self) -> Option<&RecipeRunner> {
        self.components.iter().find_map(|c| match c {
            Component::RecipeRunner(r) => Some(r),
            _ => None,
        })
    }

    pub fn runner_mut(&mut self) -> Option<&mut RecipeRunner> {
        self.components.iter_mut().find_map(|c| match c {
            Component::RecipeRunner(r) => Some(r),
            _ => None,
        })
    }

    pub fn consumer(&self) -> Option<&PowerConsumer> {
        self.components.iter().find_map(|c| match c {
            Component::PowerConsumer(p) => Some(p),
            _ => None,
        })
    }

    pub fn producer(&self) -> Option<&PowerProducer> {
        self.components.iter().find_map(|c| match c {
            Component::PowerProducer(p) => Some(p),
            _ => None,
        })
    }

    pub fn producer_mut(&mut self) -> Option<&mut PowerProducer> {
        self.components.iter_mut().find_map(|c| match c {
            Component::PowerProducer(p) => Some(p),
            _ => None,
        })
    }

    pub fn drill(&self) -> Option<&MiningDrill> {
        self.components.iter().find_map(|c| match c {
            Component::MiningDrill(d) => Some(d),
            _ => None,
        })
    }

    pub fn is_producer(&self) -> bool {
        self.producer().is_some()
    }

    pub fn is_consumer(&self) -> bool {
        self.consumer().is_some()
    }

    /// Whether a grid of `voltage` should attach this machine. A machine
    /// only joins grids of its own power components' voltage, so a producer
    /// touched by cables of two tiers feeds exactly one grid.
    pub fn joins_grid(&self, voltage: Voltage) -> bool {
        self.producer().is_some_and(|p| p.voltage == voltage)
            || self.consumer().is_some_and(|c| c.voltage == voltage)
    }

    /// The producer, if it feeds grids of `voltage`.
    pub fn supplier(&self, voltage: Voltage) -> Option<&PowerProducer> {
        self.producer().filter(|p| p.voltage == voltage)
    }

    // -- Conditions --

    /// True iff every component exposing a runnable condition agrees.
    /// `require_power = false` asks "would I run if I had power".
    pub fn can_run(&self, catalog: &Catalog, require_power: bool) -> bool {
        self.components
            .iter()
            .filter_map(|c| c.evaluate_condition(self, catalog, require_power))
            .all(|ok| ok)
    }

    /// False only when a fluid consumer went unsatisfied this tick.
    pub fn fluid_satisfied(&self) -> bool {
        self.components.iter().all(|c| match c {
            Component::FluidConsumer(f) => f.satisfied,
            _ => true,
        })
    }

    fn powered(&self) -> bool {
        self.consumer().is_none_or(|c| c.has_power)
    }

    // -- Mutation --

    /// Select a recipe (or none). Rejects recipes whose capabilities the
    /// runner does not declare.
    pub fn select_recipe(
        &mut self,
        recipe: Option<RecipeId>,
        catalog: &Catalog,
    ) -> Result<(), SimError> {
        let runner = self.runner_mut().ok_or(SimError::NoRecipeRunner)?;
        if let Some(id) = recipe {
            let def = catalog.recipe(id).ok_or(SimError::UnknownRecipe(id))?;
            if !def.is_compatible(runner.capabilities()) {
                return Err(SimError::IncompatibleRecipe(def.key.clone()));
            }
        }
        runner.select(recipe);
        Ok(())
    }

    /// The consumer's demand for this tick and its voltage, if it has one.
    pub fn power_request(&self, catalog: &Catalog) -> Option<(u64, Voltage)> {
        let consumer = self.consumer()?;
        let would_run = self.can_run(catalog, false);
        Some((consumer.demand(would_run), consumer.voltage))
    }

    /// Store the outcome of this tick's draw on the consumer.
    pub fn record_power(&mut self, demand: u64, granted: bool) {
        for c in &mut self.components {
            if let Component::PowerConsumer(p) = c {
                p.has_power = granted;
                p.last_demand = demand;
            }
        }
    }

    /// Enforce `quantity == 0 => item is none` on every node.
    pub fn clear_empty_nodes(&mut self) {
        for n in &mut self.nodes {
            n.clear_if_empty();
        }
    }

    // -- Component ticks --

    /// Tick the component at `index`. Power consumers are skipped here.
    pub fn tick_component(&mut self, index: usize, ctx: &mut MachineContext<'_>) {
        match self.components.get(index) {
            Some(Component::RecipeRunner(_)) => self.tick_runner(index, ctx),
            Some(Component::PowerProducer(_)) => {
                let online = self.fluid_satisfied();
                if let Some(Component::PowerProducer(p)) = self.components.get_mut(index) {
                    p.generate(online);
                }
            }
            Some(Component::Importer(_)) => {
                if let Some(Component::Importer(imp)) = self.components.get_mut(index)
                    && let Some((item, quantity)) = imp.tick(&mut self.nodes, ctx.inventory)
                {
                    ctx.events.push(SimEvent::ItemsImported {
                        machine: ctx.id,
                        item,
                        quantity,
                        tick: ctx.tick,
                    });
                }
            }
            Some(Component::FluidConsumer(_)) => {
                if let Some(Component::FluidConsumer(f)) = self.components.get_mut(index) {
                    f.tick(&mut self.nodes);
                }
            }
            Some(Component::MiningDrill(_)) => self.tick_drill(index, ctx),
            Some(Component::PowerConsumer(_)) | None => {}
        }
    }

    fn tick_runner(&mut self, index: usize, ctx: &mut MachineContext<'_>) {
        let Some(recipe_id) = self.runner().and_then(|r| r.recipe()) else {
            return;
        };
        let Some(recipe) = ctx.catalog.recipe(recipe_id) else {
            return;
        };
        let runnable = self.can_run(ctx.catalog, true);
        let step = match self.components.get_mut(index) {
            Some(Component::RecipeRunner(r)) => r.step(runnable, recipe.duration),
            _ => return,
        };

        if step.interrupted {
            tracing::trace!(machine = ?ctx.id, recipe = %recipe.key, "recipe interrupted");
            ctx.events.push(SimEvent::RecipeInterrupted {
                machine: ctx.id,
                recipe: recipe_id,
                tick: ctx.tick,
            });
        }
        if step.started {
            for entry in &recipe.inputs {
                node::deduct(&mut self.nodes, entry.item, entry.quantity);
            }
            tracing::trace!(machine = ?ctx.id, recipe = %recipe.key, "recipe started");
            ctx.events.push(SimEvent::RecipeStarted {
                machine: ctx.id,
                recipe: recipe_id,
                tick: ctx.tick,
            });
        }
        if step.completed {
            self.produce_outputs(recipe, ctx.id, ctx.events, ctx.tick);
            tracing::trace!(machine = ?ctx.id, recipe = %recipe.key, "recipe completed");
            ctx.events.push(SimEvent::RecipeCompleted {
                machine: ctx.id,
                recipe: recipe_id,
                tick: ctx.tick,
            });
        }
    }

    /// Deliver a recipe's outputs. Whatever does not fit is logged and
    /// discarded. Returns the discarded amount.
    pub fn produce_outputs(
        &mut self,
        recipe: &RecipeDef,
        id: MachineId,
        events: &mut EventBuffer,
        tick: Ticks,
    ) -> u64 {
        let mut dropped_total = 0;
        match recipe.output_kind {
            OutputKind::Item => {
                for entry in &recipe.outputs {
                    let dropped = node::deposit(&mut self.nodes, entry.item, entry.quantity);
                    if dropped > 0 {
                        tracing::warn!(
                            machine = ?id,
                            recipe = %recipe.key,
                            item = ?entry.item,
                            dropped,
                            "output nodes full at recipe completion, discarding excess"
                        );
                        events.push(SimEvent::OutputOverflow {
                            machine: id,
                            item: Some(entry.item),
                            dropped: dropped as u64,
                            tick,
                        });
                        dropped_total += dropped as u64;
                    }
                }
            }
            OutputKind::Energy => {
                let energy = recipe.energy_output();
                let dropped = match self.producer_mut() {
                    Some(p) => p.add_energy(energy),
                    None => energy,
                };
                if dropped > 0 {
                    tracing::warn!(
                        machine = ?id,
                        recipe = %recipe.key,
                        dropped,
                        "producer buffer full at recipe completion, discarding excess"
                    );
                    events.push(SimEvent::OutputOverflow {
                        machine: id,
                        item: None,
                        dropped,
                        tick,
                    });
                    dropped_total += dropped;
                }
            }
        }
        dropped_total
    }

    fn tick_drill(&mut self, index: usize, ctx: &mut MachineContext<'_>) {
        if !self.enabled || !self.powered() {
            return;
        }
        let (resource_id, quantity) = match self.components.get_mut(index) {
            Some(Component::MiningDrill(d)) => {
                if !d.advance() {
                    return;
                }
                match d.resource {
                    Some(r) => (r, d.quantity),
                    None => return,
                }
            }
            _ => return,
        };

        let Some(patch) = ctx.resources.get_mut(resource_id) else {
            return;
        };
        let Some(def) = ctx.catalog.resource(patch.archetype) else {
            return;
        };
        let amount = patch.available(quantity);
        if amount == 0 {
            return;
        }
        let Some(item) = resource::roll_drop(def, ctx.rng) else {
            return;
        };
        if !node::output_room_for(&self.nodes, &[(item, amount)]) {
            return;
        }
        let leftover = node::deposit(&mut self.nodes, item, amount);
        let mined = amount - leftover;
        patch.extract(mined);
        ctx.events.push(SimEvent::ResourceMined {
            machine: ctx.id,
            resource: resource_id,
            item,
            quantity: mined,
            tick: ctx.tick,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::*;
    use crate::node::{NodeDirection, NodeKind};
    use std::collections::BTreeSet;

    fn fx(v: i32) -> Fixed64 {
        Fixed64::from_num(v)
    }

    fn archetype() -> MachineArchetype {
        MachineArchetype {
            key: "press".into(),
            name: "Press".into(),
            footprint: vec![(0, 0), (1, 0)],
            center: (1, 0),
            nodes: vec![
                NodeDescriptor {
                    id: "in".into(),
                    kind: NodeKind::Item,
                    direction: NodeDirection::Input,
                    offset: (fx(0), fx(-1)),
                    capacity: 8,
                },
                NodeDescriptor {
                    id: "out".into(),
                    kind: NodeKind::Item,
                    direction: NodeDirection::Output,
                    offset: (Fixed64::from_num(1.4), fx(0)),
                    capacity: 8,
                },
                NodeDescriptor {
                    id: "power".into(),
                    kind: NodeKind::Energy,
                    direction: NodeDirection::Input,
                    offset: (fx(0), fx(1)),
                    capacity: 0,
                },
            ],
            components: vec![
                ComponentSpec::RecipeRunner {
                    capabilities: BTreeSet::from(["pressing".to_string()]),
                    forced_recipe: None,
                },
                ComponentSpec::PowerConsumer {
                    watts_required: 10,
                    idle_watts: 1,
                    voltage: Voltage::Lv,
                },
            ],
        }
    }

    fn make_machine_id() -> MachineId {
        let mut sm: SlotMap<MachineId, ()> = SlotMap::with_key();
        sm.insert(())
    }

    #[test]
    fn placement_resolves_absolute_positions() {
        let m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(10, 10),
            Rotation::None,
            None,
        );
        assert_eq!(m.tiles, vec![GridPosition::new(10, 10), GridPosition::new(11, 10)]);
        // Center is (11, 10); 1.4 rounds to 1.
        assert_eq!(m.node("in").unwrap().position, GridPosition::new(11, 9));
        assert_eq!(m.node("out").unwrap().position, GridPosition::new(12, 10));
        assert_eq!(
            m.energy_positions().collect::<Vec<_>>(),
            vec![GridPosition::new(11, 11)]
        );
    }

    #[test]
    fn rotation_rotates_footprint_and_nodes() {
        let m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(0, 0),
            Rotation::Cw90,
            None,
        );
        assert_eq!(m.tiles, vec![GridPosition::new(0, 0), GridPosition::new(0, 1)]);
        // Center (1,0) -> (0,1); "out" offset (1.4,0) -> (0,1.4) -> (0,1).
        assert_eq!(m.node("out").unwrap().position, GridPosition::new(0, 2));
        assert_eq!(m.node("in").unwrap().position, GridPosition::new(1, 1));
    }

    #[test]
    fn placements_cover_every_node() {
        let id = make_machine_id();
        let m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(0, 0),
            Rotation::None,
            None,
        );
        let p = m.placements(id);
        assert_eq!(p.len(), 3);
        assert_eq!(p[2].kind, NodeKind::Energy);
        assert_eq!(p[1].node, NodeRef::new(id, 1));
    }

    #[test]
    fn component_order_follows_archetype() {
        let m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(0, 0),
            Rotation::None,
            None,
        );
        let names: Vec<&str> = m.components.iter().map(Component::type_name).collect();
        assert_eq!(names, vec!["RecipeRunner", "PowerConsumer"]);
        assert!(m.is_consumer());
        assert!(!m.is_producer());
        assert!(m.joins_grid(Voltage::Lv));
        assert!(!m.joins_grid(Voltage::Mv));
    }

    #[test]
    fn record_power_updates_consumer() {
        let mut m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(0, 0),
            Rotation::None,
            None,
        );
        m.record_power(10, true);
        let c = m.consumer().unwrap();
        assert!(c.has_power);
        assert_eq!(c.last_demand, 10);
    }

    #[test]
    fn clear_empty_nodes_drops_claims() {
        let mut m = Machine::new(
            MachineTypeId(0),
            &archetype(),
            GridPosition::new(0, 0),
            Rotation::None,
            None,
        );
        m.nodes[1].claim(ItemId(4));
        m.clear_empty_nodes();
        assert_eq!(m.nodes[1].item(), None);
    }
}
