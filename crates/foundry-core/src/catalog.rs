//! Data Catalog: the immutable, load-time registry of content.
//!
//! Holds items, recipes, machine archetypes, link/cable archetypes and
//! resource-node archetypes. Built once through [`CatalogBuilder`] and never
//! mutated afterwards; the world shares it behind an `Arc`.
//!
//! Lifecycle mirrors every other registry in the engine:
//! registration -> mutation -> `build()` (validation + freeze).

use crate::fixed::{Fixed64, Ticks};
use crate::id::*;
use crate::node::{NodeDirection, NodeKind};
use crate::power::Voltage;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ===========================================================================
// Definitions
// ===========================================================================

#[derive(Debug, Clone)]
pub struct ItemDef {
    pub name: String,
}

/// A recipe input/output entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipeEntry {
    pub item: ItemId,
    pub quantity: u32,
}

impl RecipeEntry {
    pub fn new(item: ItemId, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    #[default]
    Item,
    Energy,
}

#[derive(Debug, Clone)]
pub struct RecipeDef {
    /// String identifier the content refers to this recipe by.
    pub key: String,
    pub name: String,
    pub inputs: Vec<RecipeEntry>,
    pub outputs: Vec<RecipeEntry>,
    pub required_capabilities: BTreeSet<String>,
    pub duration: Ticks,
    pub output_kind: OutputKind,
}

impl RecipeDef {
    /// Energy added to a producer buffer on completion of an energy recipe.
    pub fn energy_output(&self) -> u64 {
        self.outputs.iter().map(|e| e.quantity as u64).sum()
    }

    /// Outputs as `(item, quantity)` pairs in declaration order.
    pub fn output_pairs(&self) -> Vec<(ItemId, u32)> {
        self.outputs.iter().map(|e| (e.item, e.quantity)).collect()
    }

    /// Whether a machine declaring `capabilities` may run this recipe.
    pub fn is_compatible(&self, capabilities: &BTreeSet<String>) -> bool {
        self.required_capabilities.is_subset(capabilities)
    }
}

/// One I/O node of a machine archetype. Offsets are in tiles relative to
/// the archetype's center tile, before rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub id: String,
    pub kind: NodeKind,
    pub direction: NodeDirection,
    pub offset: (Fixed64, Fixed64),
    pub capacity: u32,
}

/// Construction arguments for one machine component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentSpec {
    RecipeRunner {
        capabilities: BTreeSet<String>,
        forced_recipe: Option<RecipeId>,
    },
    PowerConsumer {
        watts_required: u64,
        idle_watts: u64,
        voltage: Voltage,
    },
    PowerProducer {
        watts: u64,
        voltage: Voltage,
        max_buffer: u64,
    },
    Importer {
        transfer_ticks: u32,
        transfer_quantity: u32,
        node: String,
    },
    FluidConsumer {
        fluid: ItemId,
        consumption_rate: u32,
        node: String,
    },
    MiningDrill {
        ticks_per_cycle: u32,
        quantity: u32,
    },
}

impl ComponentSpec {
    /// The component-type name used in content files.
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentSpec::RecipeRunner { .. } => "RecipeRunner",
            ComponentSpec::PowerConsumer { .. } => "PowerConsumer",
            ComponentSpec::PowerProducer { .. } => "PowerProducer",
            ComponentSpec::Importer { .. } => "Importer",
            ComponentSpec::FluidConsumer { .. } => "FluidConsumer",
            ComponentSpec::MiningDrill { .. } => "MiningDrill",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MachineArchetype {
    pub key: String,
    pub name: String,
    /// Occupied tiles relative to the anchor.
    pub footprint: Vec<(i32, i32)>,
    /// Center tile relative to the anchor; node offsets hang off it.
    pub center: (i32, i32),
    pub nodes: Vec<NodeDescriptor>,
    /// Components in tick order.
    pub components: Vec<ComponentSpec>,
}

impl MachineArchetype {
    /// Capabilities declared by the archetype's recipe runner, if it has one.
    pub fn capabilities(&self) -> Option<&BTreeSet<String>> {
        self.components.iter().find_map(|c| match c {
            ComponentSpec::RecipeRunner { capabilities, .. } => Some(capabilities),
            _ => None,
        })
    }

    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Item,
    Fluid,
    Power,
}

impl LinkKind {
    /// Whether a link of this kind may use a node of `kind` as an endpoint.
    pub fn matches_node(self, kind: NodeKind) -> bool {
        matches!(
            (self, kind),
            (LinkKind::Item, NodeKind::Item) | (LinkKind::Fluid, NodeKind::Fluid)
        )
    }
}

/// Archetype shared by transfer links (item/fluid) and cables (power).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkArchetype {
    pub key: String,
    pub kind: LinkKind,
    pub transfer_quantity: u32,
    pub transfer_ticks: u32,
    /// Only meaningful for power cables.
    pub voltage: Voltage,
}

#[derive(Debug, Clone)]
pub struct ResourceArchetype {
    pub key: String,
    /// Tiles covered, width x height from the spawn position.
    pub size: (u32, u32),
    /// Weighted drops in declaration order.
    pub drop_table: Vec<(ItemId, Fixed64)>,
    /// Total yield; `None` never depletes.
    pub amount: Option<u64>,
}

// ===========================================================================
// Builder
// ===========================================================================

/// Builder for the immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_key_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineArchetype>,
    machine_key_to_id: HashMap<String, MachineTypeId>,
    links: Vec<LinkArchetype>,
    link_key_to_id: HashMap<String, LinkTypeId>,
    resources: Vec<ResourceArchetype>,
    resource_key_to_id: HashMap<String, ResourceTypeId>,
    duplicates: Vec<String>,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Intern an item by name. Registering a name twice returns the
    /// existing id.
    pub fn register_item(&mut self, name: &str) -> ItemId {
        if let Some(id) = self.item_name_to_id.get(name) {
            return *id;
        }
        let id = ItemId(self.items.len() as u32);
        self.items.push(ItemDef {
            name: name.to_string(),
        });
        self.item_name_to_id.insert(name.to_string(), id);
        id
    }

    /// Phase 1: Register a recipe. Returns its ID.
    pub fn register_recipe(&mut self, recipe: RecipeDef) -> RecipeId {
        let id = RecipeId(self.recipes.len() as u32);
        if self.recipe_key_to_id.insert(recipe.key.clone(), id).is_some() {
            self.duplicates.push(format!("recipe '{}'", recipe.key));
        }
        self.recipes.push(recipe);
        id
    }

    /// Phase 1: Register a machine archetype. Returns its ID.
    pub fn register_machine(&mut self, archetype: MachineArchetype) -> MachineTypeId {
        let id = MachineTypeId(self.machines.len() as u32);
        if self.machine_key_to_id.insert(archetype.key.clone(), id).is_some() {
            self.duplicates.push(format!("machine '{}'", archetype.key));
        }
        self.machines.push(archetype);
        id
    }

    /// Phase 1: Register a transfer-link or cable archetype. Returns its ID.
    pub fn register_link(&mut self, archetype: LinkArchetype) -> LinkTypeId {
        let id = LinkTypeId(self.links.len() as u32);
        if self.link_key_to_id.insert(archetype.key.clone(), id).is_some() {
            self.duplicates.push(format!("link '{}'", archetype.key));
        }
        self.links.push(archetype);
        id
    }

    /// Phase 1: Register a resource-node archetype. Returns its ID.
    pub fn register_resource(&mut self, archetype: ResourceArchetype) -> ResourceTypeId {
        let id = ResourceTypeId(self.resources.len() as u32);
        if self.resource_key_to_id.insert(archetype.key.clone(), id).is_some() {
            self.duplicates.push(format!("resource '{}'", archetype.key));
        }
        self.resources.push(archetype);
        id
    }

    /// Phase 2: Mutate an existing recipe by key.
    pub fn mutate_recipe<F>(&mut self, key: &str, f: F) -> Result<(), CatalogError>
    where
        F: FnOnce(&mut RecipeDef),
    {
        let id = self
            .recipe_key_to_id
            .get(key)
            .ok_or_else(|| CatalogError::NotFound(key.to_string()))?;
        f(&mut self.recipes[id.0 as usize]);
        Ok(())
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, key: &str) -> Option<RecipeId> {
        self.recipe_key_to_id.get(key).copied()
    }

    /// Phase 3: Validate cross references and freeze.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        if let Some(dup) = self.duplicates.first() {
            return Err(CatalogError::Duplicate(dup.clone()));
        }

        for recipe in &self.recipes {
            for entry in recipe.inputs.iter().chain(recipe.outputs.iter()) {
                if entry.item.0 as usize >= self.items.len() {
                    return Err(CatalogError::InvalidItemRef(entry.item));
                }
            }
            if recipe.duration == 0 {
                return Err(CatalogError::InvalidRecipe {
                    recipe: recipe.key.clone(),
                    reason: "duration must be at least one tick",
                });
            }
        }

        let declared: BTreeSet<&String> = self
            .machines
            .iter()
            .filter_map(|m| m.capabilities())
            .flatten()
            .collect();
        for recipe in &self.recipes {
            if let Some(cap) = recipe
                .required_capabilities
                .iter()
                .find(|c| !declared.contains(c))
            {
                return Err(CatalogError::UnknownCapability {
                    recipe: recipe.key.clone(),
                    capability: cap.clone(),
                });
            }
        }

        for machine in &self.machines {
            self.validate_machine(machine)?;
        }

        for link in &self.links {
            if link.kind != LinkKind::Power && link.transfer_ticks == 0 {
                return Err(CatalogError::InvalidLink {
                    link: link.key.clone(),
                    reason: "transfer_ticks must be at least one",
                });
            }
        }

        Ok(Catalog {
            items: self.items,
            item_name_to_id: self.item_name_to_id,
            recipes: self.recipes,
            recipe_key_to_id: self.recipe_key_to_id,
            machines: self.machines,
            machine_key_to_id: self.machine_key_to_id,
            links: self.links,
            link_key_to_id: self.link_key_to_id,
            resources: self.resources,
            resource_key_to_id: self.resource_key_to_id,
        })
    }

    fn validate_machine(&self, machine: &MachineArchetype) -> Result<(), CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidMachine {
            machine: machine.key.clone(),
            reason,
        };

        if machine.footprint.is_empty() {
            return Err(invalid("footprint is empty".into()));
        }
        for (i, node) in machine.nodes.iter().enumerate() {
            if machine.nodes[..i].iter().any(|n| n.id == node.id) {
                return Err(invalid(format!("duplicate node id '{}'", node.id)));
            }
            if node.kind.holds_items() && node.capacity == 0 {
                return Err(invalid(format!("node '{}' has zero capacity", node.id)));
            }
        }

        let mut seen: Vec<&'static str> = Vec::new();
        for component in &machine.components {
            let name = component.type_name();
            if seen.contains(&name) {
                return Err(invalid(format!("component {name} declared twice")));
            }
            seen.push(name);

            match component {
                ComponentSpec::RecipeRunner {
                    capabilities,
                    forced_recipe: Some(recipe),
                } => {
                    let def = self
                        .recipes
                        .get(recipe.0 as usize)
                        .ok_or(CatalogError::InvalidRecipeRef(*recipe))?;
                    if !def.is_compatible(capabilities) {
                        return Err(CatalogError::IncompatibleRecipe {
                            recipe: def.key.clone(),
                            machine: machine.key.clone(),
                        });
                    }
                }
                ComponentSpec::Importer {
                    node,
                    transfer_ticks,
                    ..
                } => {
                    if machine.node_index(node).is_none() {
                        return Err(invalid(format!("importer node '{node}' not declared")));
                    }
                    if *transfer_ticks == 0 {
                        return Err(invalid("importer transfer_ticks is zero".into()));
                    }
                }
                ComponentSpec::FluidConsumer { node, fluid, .. } => {
                    if machine.node_index(node).is_none() {
                        return Err(invalid(format!("fluid node '{node}' not declared")));
                    }
                    if fluid.0 as usize >= self.items.len() {
                        return Err(CatalogError::InvalidItemRef(*fluid));
                    }
                }
                ComponentSpec::MiningDrill {
                    ticks_per_cycle, ..
                } if *ticks_per_cycle == 0 => {
                    return Err(invalid("drill ticks_per_cycle is zero".into()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

// ===========================================================================
// Catalog
// ===========================================================================

/// Immutable catalog. Frozen after build(); share it freely.
#[derive(Debug)]
pub struct Catalog {
    items: Vec<ItemDef>,
    item_name_to_id: HashMap<String, ItemId>,
    recipes: Vec<RecipeDef>,
    recipe_key_to_id: HashMap<String, RecipeId>,
    machines: Vec<MachineArchetype>,
    machine_key_to_id: HashMap<String, MachineTypeId>,
    links: Vec<LinkArchetype>,
    link_key_to_id: HashMap<String, LinkTypeId>,
    resources: Vec<ResourceArchetype>,
    resource_key_to_id: HashMap<String, ResourceTypeId>,
}

impl Catalog {
    pub fn item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.0 as usize)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn machine(&self, id: MachineTypeId) -> Option<&MachineArchetype> {
        self.machines.get(id.0 as usize)
    }

    pub fn link(&self, id: LinkTypeId) -> Option<&LinkArchetype> {
        self.links.get(id.0 as usize)
    }

    pub fn resource(&self, id: ResourceTypeId) -> Option<&ResourceArchetype> {
        self.resources.get(id.0 as usize)
    }

    pub fn item_id(&self, name: &str) -> Option<ItemId> {
        self.item_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, key: &str) -> Option<RecipeId> {
        self.recipe_key_to_id.get(key).copied()
    }

    pub fn machine_id(&self, key: &str) -> Option<MachineTypeId> {
        self.machine_key_to_id.get(key).copied()
    }

    pub fn link_id(&self, key: &str) -> Option<LinkTypeId> {
        self.link_key_to_id.get(key).copied()
    }

    pub fn resource_id(&self, key: &str) -> Option<ResourceTypeId> {
        self.resource_key_to_id.get(key).copied()
    }

    pub fn item_name(&self, id: ItemId) -> &str {
        self.item(id).map(|i| i.name.as_str()).unwrap_or("<unknown>")
    }

    /// Recipes a machine declaring `capabilities` may select, in catalog order.
    pub fn compatible_recipes(&self, capabilities: &BTreeSet<String>) -> Vec<RecipeId> {
        self.recipes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_compatible(capabilities))
            .map(|(i, _)| RecipeId(i as u32))
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn machine_count(&self) -> usize {
        self.machines.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("invalid item reference: {0:?}")]
    InvalidItemRef(ItemId),
    #[error("invalid recipe reference: {0:?}")]
    InvalidRecipeRef(RecipeId),
    #[error("recipe '{recipe}' requires unknown capability '{capability}'")]
    UnknownCapability { recipe: String, capability: String },
    #[error("recipe '{recipe}' is not compatible with machine '{machine}'")]
    IncompatibleRecipe { recipe: String, machine: String },
    #[error("invalid recipe '{recipe}': {reason}")]
    InvalidRecipe {
        recipe: String,
        reason: &'static str,
    },
    #[error("invalid machine '{machine}': {reason}")]
    InvalidMachine { machine: String, reason: String },
    #[error("invalid link '{link}': {reason}")]
    InvalidLink { link: String, reason: &'static str },
}
