//! The world: the explicitly constructed simulation context.
//!
//! Owns the shared catalog handle, the entity arenas, the spatial registry,
//! the global inventory, the RNG and the event buffer. Every external
//! mutation goes through a method here, and each one either completes or
//! returns an error having changed nothing. The per-tick phase order lives
//! in [`Scheduler`](crate::sim::Scheduler); the world supplies the steps.

use crate::catalog::{Catalog, ComponentSpec, LinkKind};
use crate::component::Component;
use crate::config::SimConfig;
use crate::entity::EntityManager;
use crate::event::{EventBuffer, SimEvent};
use crate::fixed::Ticks;
use crate::id::*;
use crate::inventory::GlobalInventory;
use crate::link::{LinkTickStats, TransferLink};
use crate::machine::{Machine, MachineContext};
use crate::power::PowerCable;
use crate::recipe::RunnerState;
use crate::resource::{self, ResourceNode};
use crate::rng::SimRng;
use crate::sim::StateHash;
use crate::spatial::{GridPosition, Rotation, SpatialError, SpatialIoRegistry};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("unknown machine archetype {0:?}")]
    UnknownMachineType(MachineTypeId),
    #[error("unknown link archetype {0:?}")]
    UnknownLinkType(LinkTypeId),
    #[error("unknown resource archetype {0:?}")]
    UnknownResourceType(ResourceTypeId),
    #[error("unknown recipe {0:?}")]
    UnknownRecipe(RecipeId),
    #[error("unknown item {0:?}")]
    UnknownItem(ItemId),
    #[error("recipe '{0}' is not compatible with this machine")]
    IncompatibleRecipe(String),
    #[error("machine has no recipe runner")]
    NoRecipeRunner,
    #[error(transparent)]
    Spatial(#[from] SpatialError),
    #[error("no resource node under ({}, {})", .0.x, .0.y)]
    NoResourceNode(GridPosition),
    #[error("machine {0:?} not found")]
    MachineNotFound(MachineId),
    #[error("machine has no node named '{0}'")]
    NodeNotFound(String),
    #[error("node '{0}' does not hold items")]
    NotAnItemNode(String),
    #[error("node '{node}' already holds a different item")]
    ItemMismatch { node: String },
    #[error("link {0:?} not found")]
    LinkNotFound(LinkId),
    #[error("cable {0:?} not found")]
    CableNotFound(CableId),
    #[error("resource node {0:?} not found")]
    ResourceNotFound(ResourceNodeId),
    #[error("archetype '{archetype}' cannot be used for a {expected}")]
    LinkKindMismatch {
        archetype: String,
        expected: &'static str,
    },
    #[error("link starts and ends at ({}, {})", .0.x, .0.y)]
    DegenerateLink(GridPosition),
}

#[derive(Debug)]
pub struct World {
    catalog: Arc<Catalog>,
    config: SimConfig,
    tick: Ticks,
    pub(crate) entities: EntityManager,
    pub(crate) io: SpatialIoRegistry,
    inventory: GlobalInventory,
    rng: SimRng,
    events: EventBuffer,
}

impl World {
    pub fn new(catalog: Arc<Catalog>, config: SimConfig) -> Self {
        Self {
            rng: SimRng::new(config.rng_seed),
            events: EventBuffer::new(config.event_capacity),
            catalog,
            config,
            tick: 0,
            entities: EntityManager::new(),
            io: SpatialIoRegistry::new(),
            inventory: GlobalInventory::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks executed so far.
    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn inventory(&self) -> &GlobalInventory {
        &self.inventory
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    pub fn registry(&self) -> &SpatialIoRegistry {
        &self.io
    }

    pub fn events(&self) -> &EventBuffer {
        &self.events
    }

    /// Remove and return every recorded event, oldest first.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.events.drain()
    }

    // -----------------------------------------------------------------------
    // Machines
    // -----------------------------------------------------------------------

    /// Place a machine with its anchor at `position`. Nothing is registered
    /// if any tile or node position is taken.
    pub fn place_machine(
        &mut self,
        archetype: MachineTypeId,
        position: GridPosition,
        rotation: Rotation,
    ) -> Result<MachineId, SimError> {
        let def = self
            .catalog
            .machine(archetype)
            .ok_or(SimError::UnknownMachineType(archetype))?;

        let needs_resource = def
            .components
            .iter()
            .any(|c| matches!(c, ComponentSpec::MiningDrill { .. }));
        let resource = if needs_resource {
            Some(
                self.entities
                    .resource_at(position)
                    .ok_or(SimError::NoResourceNode(position))?,
            )
        } else {
            None
        };

        let machine = Machine::new(archetype, def, position, rotation, resource);
        let id = self.entities.machines.insert(machine);
        let (tiles, placements) = {
            let m = &self.entities.machines[id];
            (m.tiles.clone(), m.placements(id))
        };
        if let Err(e) = self.io.register_machine(id, &tiles, &placements) {
            self.entities.machines.remove(id);
            return Err(e.into());
        }

        if let Some(m) = self.entities.machines.get(id) {
            for pos in m.energy_positions() {
                self.entities.cables.mark_dirty_at(pos);
            }
        }
        tracing::debug!(machine = ?id, archetype = %def.key, x = position.x, y = position.y, "machine placed");
        Ok(id)
    }

    /// Destroy a machine: deregister its nodes, detach it from its grid and
    /// mark cables touching its energy nodes dirty.
    pub fn remove_machine(&mut self, id: MachineId) -> Result<(), SimError> {
        let machine = self
            .entities
            .machines
            .remove(id)
            .ok_or(SimError::MachineNotFound(id))?;
        self.io
            .unregister_machine(id, &machine.tiles, &machine.placements(id));
        self.entities.cables.detach_machine(id, machine.grid);
        for pos in machine.energy_positions() {
            self.entities.cables.mark_dirty_at(pos);
        }
        tracing::debug!(machine = ?id, "machine removed");
        Ok(())
    }

    pub fn machine(&self, id: MachineId) -> Option<&Machine> {
        self.entities.machines.get(id)
    }

    fn machine_mut(&mut self, id: MachineId) -> Result<&mut Machine, SimError> {
        self.entities
            .machines
            .get_mut(id)
            .ok_or(SimError::MachineNotFound(id))
    }

    /// Select a recipe, or clear it with `None`. Incompatible recipes are
    /// rejected and leave the current selection untouched.
    pub fn set_recipe(&mut self, id: MachineId, recipe: Option<RecipeId>) -> Result<(), SimError> {
        let catalog = Arc::clone(&self.catalog);
        self.machine_mut(id)?.select_recipe(recipe, &catalog)?;
        tracing::debug!(
            machine = ?id,
            recipe = recipe.and_then(|r| catalog.recipe(r)).map(|r| r.key.as_str()),
            "recipe selected"
        );
        Ok(())
    }

    pub fn set_machine_enabled(&mut self, id: MachineId, enabled: bool) -> Result<(), SimError> {
        self.machine_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Put up to `quantity` of `item` into a named node. Returns the amount
    /// accepted, which is less than offered when the node fills up.
    pub fn inject(
        &mut self,
        id: MachineId,
        node: &str,
        item: ItemId,
        quantity: u32,
    ) -> Result<u32, SimError> {
        if self.catalog.item(item).is_none() {
            return Err(SimError::UnknownItem(item));
        }
        let target = self
            .machine_mut(id)?
            .node_mut(node)
            .ok_or_else(|| SimError::NodeNotFound(node.to_string()))?;
        if !target.kind.holds_items() {
            return Err(SimError::NotAnItemNode(node.to_string()));
        }
        if !target.accepts(item) {
            return Err(SimError::ItemMismatch {
                node: node.to_string(),
            });
        }
        Ok(target.insert(item, quantity))
    }

    /// Take up to `quantity` out of a named node. Returns what was removed,
    /// or `None` if the node was empty.
    pub fn withdraw(
        &mut self,
        id: MachineId,
        node: &str,
        quantity: u32,
    ) -> Result<Option<(ItemId, u32)>, SimError> {
        let source = self
            .machine_mut(id)?
            .node_mut(node)
            .ok_or_else(|| SimError::NodeNotFound(node.to_string()))?;
        if !source.kind.holds_items() {
            return Err(SimError::NotAnItemNode(node.to_string()));
        }
        let Some(item) = source.item() else {
            return Ok(None);
        };
        let removed = source.withdraw(quantity);
        Ok((removed > 0).then_some((item, removed)))
    }

    /// Finish the selected recipe immediately, bypassing every condition.
    /// Used to exercise the overflow-at-completion path.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn complete_recipe_now(&mut self, id: MachineId) -> Result<u64, SimError> {
        let catalog = Arc::clone(&self.catalog);
        let tick = self.tick;
        let machine = self
            .entities
            .machines
            .get_mut(id)
            .ok_or(SimError::MachineNotFound(id))?;
        let recipe_id = machine
            .runner()
            .ok_or(SimError::NoRecipeRunner)?
            .recipe()
            .ok_or(SimError::NoRecipeRunner)?;
        let recipe = catalog
            .recipe(recipe_id)
            .ok_or(SimError::UnknownRecipe(recipe_id))?;
        Ok(machine.produce_outputs(recipe, id, &mut self.events, tick))
    }

    // -----------------------------------------------------------------------
    // Links and cables
    // -----------------------------------------------------------------------

    pub fn add_link(
        &mut self,
        archetype: LinkTypeId,
        start: GridPosition,
        end: GridPosition,
    ) -> Result<LinkId, SimError> {
        let def = self
            .catalog
            .link(archetype)
            .ok_or(SimError::UnknownLinkType(archetype))?;
        if def.kind == LinkKind::Power {
            return Err(SimError::LinkKindMismatch {
                archetype: def.key.clone(),
                expected: "transfer link",
            });
        }
        if start == end {
            return Err(SimError::DegenerateLink(start));
        }
        let link = TransferLink::new(start, end, archetype, def, self.config.recency_cap);
        Ok(self.entities.links.register(link))
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<(), SimError> {
        self.entities
            .links
            .remove(id)
            .map(|_| ())
            .ok_or(SimError::LinkNotFound(id))
    }

    pub fn add_cable(
        &mut self,
        archetype: LinkTypeId,
        start: GridPosition,
        end: GridPosition,
    ) -> Result<CableId, SimError> {
        let def = self
            .catalog
            .link(archetype)
            .ok_or(SimError::UnknownLinkType(archetype))?;
        if def.kind != LinkKind::Power {
            return Err(SimError::LinkKindMismatch {
                archetype: def.key.clone(),
                expected: "power cable",
            });
        }
        if start == end {
            return Err(SimError::DegenerateLink(start));
        }
        let cable = PowerCable::new(start, end, archetype, def.voltage);
        Ok(self.entities.cables.add_cable(cable))
    }

    pub fn remove_cable(&mut self, id: CableId) -> Result<(), SimError> {
        self.entities
            .cables
            .remove_cable(id)
            .map(|_| ())
            .ok_or(SimError::CableNotFound(id))
    }

    // -----------------------------------------------------------------------
    // Resources
    // -----------------------------------------------------------------------

    pub fn spawn_resource_node(
        &mut self,
        archetype: ResourceTypeId,
        position: GridPosition,
    ) -> Result<ResourceNodeId, SimError> {
        let def = self
            .catalog
            .resource(archetype)
            .ok_or(SimError::UnknownResourceType(archetype))?;
        Ok(self
            .entities
            .resources
            .insert(ResourceNode::new(archetype, def, position)))
    }

    /// Pick one drop from a resource node into the global inventory.
    /// Returns `None` when the node is depleted or has no positive drops.
    pub fn harvest(&mut self, id: ResourceNodeId) -> Result<Option<ItemId>, SimError> {
        let node = self
            .entities
            .resources
            .get_mut(id)
            .ok_or(SimError::ResourceNotFound(id))?;
        let def = self
            .catalog
            .resource(node.archetype)
            .ok_or(SimError::UnknownResourceType(node.archetype))?;
        if node.available(1) == 0 {
            return Ok(None);
        }
        let Some(item) = resource::roll_drop(def, &mut self.rng) else {
            return Ok(None);
        };
        node.extract(1);
        self.inventory.add_item(item, 1);
        Ok(Some(item))
    }

    // -----------------------------------------------------------------------
    // Tick steps (driven by the scheduler)
    // -----------------------------------------------------------------------

    /// Tick one machine: each component in declaration order, then the
    /// empty-node cleanup. Returns false if the machine does not exist.
    pub(crate) fn tick_machine(&mut self, id: MachineId) -> bool {
        let Some(count) = self.entities.machines.get(id).map(|m| m.components.len()) else {
            return false;
        };
        for index in 0..count {
            let is_consumer = self
                .entities
                .machines
                .get(id)
                .is_some_and(|m| matches!(m.components.get(index), Some(Component::PowerConsumer(_))));
            if is_consumer {
                self.tick_power_consumer(id);
                continue;
            }
            let Some(machine) = self.entities.machines.get_mut(id) else {
                return false;
            };
            let mut ctx = MachineContext {
                id,
                catalog: &*self.catalog,
                inventory: &mut self.inventory,
                resources: &mut self.entities.resources,
                rng: &mut self.rng,
                events: &mut self.events,
                tick: self.tick,
            };
            machine.tick_component(index, &mut ctx);
        }
        if let Some(machine) = self.entities.machines.get_mut(id) {
            machine.clear_empty_nodes();
        }
        true
    }

    /// Draw this tick's demand from the machine's grid and record whether it
    /// was granted. No grid, a voltage mismatch or a short grid all deny.
    fn tick_power_consumer(&mut self, id: MachineId) {
        let catalog = &*self.catalog;
        let Some(machine) = self.entities.machines.get(id) else {
            return;
        };
        let Some((demand, voltage)) = machine.power_request(catalog) else {
            return;
        };
        let granted = match machine.grid.and_then(|g| self.entities.cables.grid_mut(g)) {
            Some(grid) => {
                grid.can_supply_wattage(demand, voltage)
                    && grid.draw_power(demand, &mut self.entities.machines)
            }
            None => false,
        };
        if let Some(machine) = self.entities.machines.get_mut(id) {
            machine.record_power(demand, granted);
        }
    }

    /// Rebuild dirty grids and tick every grid. Returns how many grids were
    /// rebuilt.
    pub(crate) fn refresh_power(&mut self) -> usize {
        self.entities
            .cables
            .refresh(
                &self.io,
                &mut self.entities.machines,
                self.config.recency_cap,
                &mut self.events,
                self.tick,
            )
            .len()
    }

    pub(crate) fn reset_link_usage(&mut self) {
        self.entities.links.reset_usage();
    }

    pub(crate) fn tick_links(&mut self) -> LinkTickStats {
        self.entities.links.tick_all(
            &self.io,
            &mut self.entities.machines,
            self.config.recency_cap,
            &mut self.events,
            self.tick,
        )
    }

    pub(crate) fn finish_tick(&mut self) {
        self.tick += 1;
    }

    // -----------------------------------------------------------------------
    // Determinism
    // -----------------------------------------------------------------------

    /// FNV-1a over every piece of mutable simulation state in arena order.
    pub fn state_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.tick);
        h.write_u64(self.rng.state());

        for (_, m) in &self.entities.machines {
            h.write_u32(m.archetype.0);
            h.write(&[m.enabled as u8]);
            for n in &m.nodes {
                h.write_u32(n.item().map_or(u32::MAX, |i| i.0));
                h.write_u32(n.quantity());
            }
            for c in &m.components {
                match c {
                    Component::RecipeRunner(r) => {
                        h.write_u32(r.recipe().map_or(u32::MAX, |id| id.0));
                        h.write(&[(r.state() == RunnerState::Running) as u8]);
                        h.write_u64(r.progress());
                    }
                    Component::PowerConsumer(p) => h.write(&[p.has_power as u8]),
                    Component::PowerProducer(p) => h.write_u64(p.buffer),
                    Component::Importer(i) => h.write_u32(i.progress),
                    Component::FluidConsumer(f) => h.write(&[f.satisfied as u8]),
                    Component::MiningDrill(d) => h.write_u32(d.progress),
                }
            }
        }
        for (_, l) in self.entities.links.iter() {
            h.write_u32(l.progress);
            h.write_u64(l.round_robin as u64);
            h.write_u32(l.ticks_since_transfer);
        }
        for (_, g) in self.entities.cables.grids() {
            h.write_u64(g.available_wattage);
            h.write_u32(g.idle_ticks);
            h.write_u64(g.connections.len() as u64);
        }
        for (_, r) in &self.entities.resources {
            h.write_u64(r.extracted);
        }
        for (item, qty) in self.inventory.iter() {
            h.write_u32(item.0);
            h.write_u64(qty);
        }
        h.finish()
    }
}
