//! Serde data file structs for game content definitions.
//!
//! These structs define the on-disk format for items, recipes, machine
//! archetypes, link/cable archetypes, resource nodes and simulation
//! settings. They are deserialized from RON, JSON, or TOML data files and
//! then resolved into catalog types by the loader.

use foundry_core::catalog::{LinkKind, OutputKind};
use foundry_core::node::{NodeDirection, NodeKind};
use foundry_core::power::Voltage;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::fmt;
use std::marker::PhantomData;

// ===========================================================================
// Ordered maps
// ===========================================================================

/// A string-keyed map that keeps the order entries appear in the file.
///
/// Recipe outputs are distributed and machine components are ticked in
/// declaration order, so a sorted or hashed map would change behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> OrderedMap<V> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct OrderedMapVisitor<V>(PhantomData<V>);

impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
    type Value = OrderedMap<V>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map with string keys")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, V>()? {
            entries.push((key, value));
        }
        Ok(OrderedMap(entries))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

// ===========================================================================
// Items
// ===========================================================================

/// An item type definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ItemData {
    pub name: String,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: OrderedMap<u32>,
    #[serde(default)]
    pub outputs: OrderedMap<u32>,
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// In ticks.
    pub duration: u64,
    #[serde(default)]
    pub output_kind: OutputKind,
}

// ===========================================================================
// Machines
// ===========================================================================

/// One I/O node of a machine archetype.
#[derive(Debug, Clone, Deserialize)]
pub struct IoNodeData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub direction: NodeDirection,
    #[serde(default)]
    pub offset: (f64, f64),
    #[serde(default)]
    pub capacity: Option<u32>,
}

/// Construction arguments for a component. Which fields are read depends
/// on the component name the arguments are keyed under.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ComponentArgsData {
    // RecipeRunner
    pub capabilities: Vec<String>,
    pub forced_recipe: Option<String>,
    // PowerConsumer / PowerProducer
    pub watts_required: Option<u64>,
    pub idle_watts: Option<u64>,
    pub watts: Option<u64>,
    pub max_buffer: Option<u64>,
    pub voltage: Option<Voltage>,
    // Importer
    pub transfer_ticks: Option<u32>,
    pub transfer_quantity: Option<u32>,
    pub node: Option<String>,
    // FluidConsumer
    pub fluid: Option<String>,
    pub consumption_rate: Option<u32>,
    // MiningDrill
    pub ticks_per_cycle: Option<u32>,
    pub quantity: Option<u32>,
}

/// A machine archetype definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineData {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_footprint")]
    pub footprint: Vec<(i32, i32)>,
    #[serde(default)]
    pub center: (i32, i32),
    #[serde(default)]
    pub ionodes: Vec<IoNodeData>,
    /// Component name -> arguments, in tick order.
    #[serde(default)]
    pub components: OrderedMap<ComponentArgsData>,
}

fn default_footprint() -> Vec<(i32, i32)> {
    vec![(0, 0)]
}

// ===========================================================================
// Links and cables
// ===========================================================================

/// A transfer-link or cable archetype definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkData {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    #[serde(default = "default_one")]
    pub transfer_quantity: u32,
    #[serde(default = "default_one")]
    pub transfer_ticks: u32,
    #[serde(default)]
    pub voltage: Voltage,
}

fn default_one() -> u32 {
    1
}

// ===========================================================================
// Resource nodes
// ===========================================================================

/// A resource-node archetype definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub id: String,
    #[serde(default = "default_size")]
    pub size: (u32, u32),
    /// Item name -> relative weight.
    pub drop_table: OrderedMap<f64>,
    /// Total yield; absent means the node never depletes.
    #[serde(default)]
    pub amount: Option<u64>,
}

fn default_size() -> (u32, u32) {
    (1, 1)
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TomlItems {
    pub items: Vec<ItemData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlRecipes {
    pub recipes: Vec<RecipeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlMachines {
    pub machines: Vec<MachineData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlLinks {
    pub links: Vec<LinkData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlResources {
    pub resources: Vec<ResourceData>,
}

// ===========================================================================
// Tests
// ===========================================================================
