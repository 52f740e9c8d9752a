//! Resolution pipeline: reads content files, resolves name references and
//! builds the immutable [`Catalog`].
//!
//! A content directory holds one file per record kind, each in RON, JSON
//! or TOML (never two formats for the same kind):
//!
//! | base name    | required | contents                         |
//! |--------------|----------|----------------------------------|
//! | `items`      | yes      | `[ItemData]`                     |
//! | `recipes`    | yes      | `[RecipeData]`                   |
//! | `machines`   | yes      | `[MachineData]`                  |
//! | `links`      | no       | `[LinkData]` (links and cables)  |
//! | `resources`  | no       | `[ResourceData]`                 |
//! | `simulation` | no       | [`SimConfig`]                    |
//!
//! Records reference each other by string id. Items resolve first, then
//! recipes, then everything that names an item or recipe.

use crate::schema::*;
use foundry_core::catalog::*;
use foundry_core::config::SimConfig;
use foundry_core::fixed::f64_to_fixed64;
use foundry_core::id::{ItemId, RecipeId};
use foundry_core::node::DEFAULT_NODE_CAPACITY;
use foundry_core::power::Voltage;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A component entry is unknown or missing a required argument.
    #[error("machine '{machine}' in {file}: component {component}: {detail}")]
    InvalidComponent {
        file: PathBuf,
        machine: String,
        component: String,
        detail: String,
    },

    /// The resolved content failed catalog validation.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Read a file and deserialize it according to its format.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list of records. RON and JSON files hold a top-level
/// array; TOML files hold an array of tables under `toml_key`.
///
/// TOML is deserialized straight from the document rather than through
/// `toml::Value`, which would sort table keys and lose declaration order.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    match detect_format(path)? {
        Format::Ron | Format::Json => deserialize_file(path),
        Format::Toml => {
            let mut tables: HashMap<String, Vec<T>> = deserialize_file(path)?;
            tables
                .remove(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Return a `DuplicateName` error if `name` is already in the map.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything a content directory defines.
#[derive(Debug)]
pub struct GameData {
    pub catalog: Catalog,
    pub config: SimConfig,
}

/// Load and resolve a content directory.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let mut b = CatalogBuilder::new();

    // Phase 1: Items.
    let items_path = require_data_file(dir, "items")?;
    let items: Vec<ItemData> = deserialize_list(&items_path, "items")?;
    let mut item_ids: HashMap<String, ItemId> = HashMap::new();
    for item in &items {
        check_duplicate(&item_ids, &item.name, &items_path)?;
        item_ids.insert(item.name.clone(), b.register_item(&item.name));
    }

    // Phase 2: Recipes.
    let recipes_path = require_data_file(dir, "recipes")?;
    let recipes: Vec<RecipeData> = deserialize_list(&recipes_path, "recipes")?;
    let mut recipe_ids: HashMap<String, RecipeId> = HashMap::new();
    for recipe in &recipes {
        check_duplicate(&recipe_ids, &recipe.id, &recipes_path)?;
        let def = resolve_recipe(recipe, &item_ids, &recipes_path)?;
        recipe_ids.insert(recipe.id.clone(), b.register_recipe(def));
    }

    // Phase 3: Machines.
    let machines_path = require_data_file(dir, "machines")?;
    let machines: Vec<MachineData> = deserialize_list(&machines_path, "machines")?;
    let mut machine_keys: HashMap<String, ()> = HashMap::new();
    for machine in &machines {
        check_duplicate(&machine_keys, &machine.id, &machines_path)?;
        machine_keys.insert(machine.id.clone(), ());
        let def = resolve_machine(machine, &item_ids, &recipe_ids, &machines_path)?;
        b.register_machine(def);
    }

    // Phase 4: Links and cables.
    if let Some(path) = find_data_file(dir, "links")? {
        let links: Vec<LinkData> = deserialize_list(&path, "links")?;
        let mut keys: HashMap<String, ()> = HashMap::new();
        for link in links {
            check_duplicate(&keys, &link.id, &path)?;
            keys.insert(link.id.clone(), ());
            b.register_link(LinkArchetype {
                key: link.id,
                kind: link.kind,
                transfer_quantity: link.transfer_quantity,
                transfer_ticks: link.transfer_ticks,
                voltage: link.voltage,
            });
        }
    }

    // Phase 5: Resource nodes.
    if let Some(path) = find_data_file(dir, "resources")? {
        let resources: Vec<ResourceData> = deserialize_list(&path, "resources")?;
        let mut keys: HashMap<String, ()> = HashMap::new();
        for resource in &resources {
            check_duplicate(&keys, &resource.id, &path)?;
            keys.insert(resource.id.clone(), ());
            let mut drop_table = Vec::with_capacity(resource.drop_table.len());
            for (name, weight) in resource.drop_table.iter() {
                let item = *resolve_name(&item_ids, name, &path, "item")?;
                drop_table.push((item, f64_to_fixed64(*weight)));
            }
            b.register_resource(ResourceArchetype {
                key: resource.id.clone(),
                size: resource.size,
                drop_table,
                amount: resource.amount,
            });
        }
    }

    // Phase 6: Simulation settings.
    let config = match find_data_file(dir, "simulation")? {
        Some(path) => deserialize_file(&path)?,
        None => SimConfig::default(),
    };

    let catalog = b.build()?;
    tracing::info!(
        dir = %dir.display(),
        items = catalog.item_count(),
        recipes = catalog.recipe_count(),
        machines = catalog.machine_count(),
        links = catalog.link_count(),
        resources = catalog.resource_count(),
        "game data loaded"
    );
    Ok(GameData { catalog, config })
}

fn resolve_entries(
    entries: &OrderedMap<u32>,
    item_ids: &HashMap<String, ItemId>,
    file: &Path,
) -> Result<Vec<RecipeEntry>, DataLoadError> {
    entries
        .iter()
        .map(|(name, qty)| {
            let item = *resolve_name(item_ids, name, file, "item")?;
            Ok::<_, DataLoadError>(RecipeEntry::new(item, *qty))
        })
        .collect()
}

fn resolve_recipe(
    recipe: &RecipeData,
    item_ids: &HashMap<String, ItemId>,
    file: &Path,
) -> Result<RecipeDef, DataLoadError> {
    Ok(RecipeDef {
        key: recipe.id.clone(),
        name: recipe.name.clone().unwrap_or_else(|| recipe.id.clone()),
        inputs: resolve_entries(&recipe.inputs, item_ids, file)?,
        outputs: resolve_entries(&recipe.outputs, item_ids, file)?,
        required_capabilities: recipe.required_capabilities.iter().cloned().collect(),
        duration: recipe.duration,
        output_kind: recipe.output_kind,
    })
}

fn resolve_machine(
    machine: &MachineData,
    item_ids: &HashMap<String, ItemId>,
    recipe_ids: &HashMap<String, RecipeId>,
    file: &Path,
) -> Result<MachineArchetype, DataLoadError> {
    let nodes = machine
        .ionodes
        .iter()
        .map(|n| NodeDescriptor {
            id: n.id.clone(),
            kind: n.kind,
            direction: n.direction,
            offset: (f64_to_fixed64(n.offset.0), f64_to_fixed64(n.offset.1)),
            capacity: n.capacity.unwrap_or(DEFAULT_NODE_CAPACITY),
        })
        .collect();

    let mut components = Vec::with_capacity(machine.components.len());
    for (name, args) in machine.components.iter() {
        let invalid = |detail: &str| DataLoadError::InvalidComponent {
            file: file.to_path_buf(),
            machine: machine.id.clone(),
            component: name.to_string(),
            detail: detail.to_string(),
        };
        let spec = match name {
            "RecipeRunner" => ComponentSpec::RecipeRunner {
                capabilities: args.capabilities.iter().cloned().collect::<BTreeSet<_>>(),
                forced_recipe: args
                    .forced_recipe
                    .as_deref()
                    .map(|r| resolve_name(recipe_ids, r, file, "recipe").copied())
                    .transpose()?,
            },
            "PowerConsumer" => ComponentSpec::PowerConsumer {
                watts_required: args
                    .watts_required
                    .ok_or_else(|| invalid("missing watts_required"))?,
                idle_watts: args.idle_watts.unwrap_or(0),
                voltage: args.voltage.unwrap_or(Voltage::Lv),
            },
            "PowerProducer" => ComponentSpec::PowerProducer {
                watts: args.watts.unwrap_or(0),
                voltage: args.voltage.unwrap_or(Voltage::Lv),
                max_buffer: args.max_buffer.ok_or_else(|| invalid("missing max_buffer"))?,
            },
            "Importer" => ComponentSpec::Importer {
                transfer_ticks: args
                    .transfer_ticks
                    .ok_or_else(|| invalid("missing transfer_ticks"))?,
                transfer_quantity: args
                    .transfer_quantity
                    .ok_or_else(|| invalid("missing transfer_quantity"))?,
                node: args.node.clone().unwrap_or_else(|| "item_in".to_string()),
            },
            "FluidConsumer" => {
                let fluid = args.fluid.as_deref().ok_or_else(|| invalid("missing fluid"))?;
                ComponentSpec::FluidConsumer {
                    fluid: *resolve_name(item_ids, fluid, file, "item")?,
                    consumption_rate: args
                        .consumption_rate
                        .ok_or_else(|| invalid("missing consumption_rate"))?,
                    node: args.node.clone().ok_or_else(|| invalid("missing node"))?,
                }
            }
            "MiningDrill" => ComponentSpec::MiningDrill {
                ticks_per_cycle: args
                    .ticks_per_cycle
                    .ok_or_else(|| invalid("missing ticks_per_cycle"))?,
                quantity: args.quantity.unwrap_or(1),
            },
            _ => return Err(invalid("unknown component type")),
        };
        components.push(spec);
    }

    Ok(MachineArchetype {
        key: machine.id.clone(),
        name: machine.name.clone().unwrap_or_else(|| machine.id.clone()),
        footprint: machine.footprint.clone(),
        center: machine.center,
        nodes,
        components,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "foundry_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const ITEMS_JSON: &str = r#"[{"name": "stone"}, {"name": "gravel"}, {"name": "energy"}]"#;

    const RECIPES_JSON: &str = r#"[
        {"id": "crush_stone", "inputs": {"stone": 1}, "outputs": {"gravel": 1},
         "required_capabilities": ["crushing"], "duration": 5},
        {"id": "burn_gravel", "inputs": {"gravel": 1}, "outputs": {"energy": 40},
         "required_capabilities": ["burning"], "duration": 2, "output_kind": "energy"}
    ]"#;

    const MACHINES_JSON: &str = r#"[
        {"id": "rock_crusher", "name": "Rock Crusher",
         "ionodes": [
            {"id": "in_main", "type": "item", "direction": "input", "offset": [-1.0, 0.0]},
            {"id": "out_main", "type": "item", "direction": "output", "offset": [1.0, 0.0], "capacity": 4}
         ],
         "components": {"RecipeRunner": {"capabilities": ["crushing"]}}},
        {"id": "boiler",
         "ionodes": [
            {"id": "in_main", "type": "item", "direction": "input", "offset": [-1.0, 0.0]},
            {"id": "power", "type": "energy", "direction": "output"}
         ],
         "components": {
            "RecipeRunner": {"capabilities": ["burning"], "forced_recipe": "burn_gravel"},
            "PowerProducer": {"max_buffer": 200, "voltage": "LV"}
         }}
    ]"#;

    fn write_core_files(dir: &Path) {
        fs::write(dir.join("items.json"), ITEMS_JSON).unwrap();
        fs::write(dir.join("recipes.json"), RECIPES_JSON).unwrap();
        fs::write(dir.join("machines.json"), MACHINES_JSON).unwrap();
    }

    // -----------------------------------------------------------------------
    // Format detection and discovery
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("items.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("items.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("items.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("items.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_single_and_absent() {
        let dir = make_test_dir("find_single");
        fs::write(dir.join("links.toml"), "links = []").unwrap();

        assert_eq!(find_data_file(&dir, "links").unwrap(), Some(dir.join("links.toml")));
        assert_eq!(find_data_file(&dir, "resources").unwrap(), None);
        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflicting_formats() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("items.ron"), "[]").unwrap();
        fs::write(dir.join("items.json"), "[]").unwrap();

        assert!(matches!(
            find_data_file(&dir, "items"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "machines").unwrap_err();
        match err {
            DataLoadError::MissingRequired { file, .. } => assert_eq!(file, "machines"),
            other => panic!("expected MissingRequired, got {other:?}"),
        }
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_toml_uses_key() {
        let dir = make_test_dir("toml_list");
        let path = dir.join("items.toml");
        fs::write(&path, "[[items]]\nname = \"zinc\"\n\n[[items]]\nname = \"apple\"\n").unwrap();

        let items: Vec<ItemData> = deserialize_list(&path, "items").unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["zinc", "apple"]);

        let err = deserialize_list::<ItemData>(&path, "recipes").unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { .. }));
        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_reports_parse_errors() {
        let dir = make_test_dir("parse_error");
        let path = dir.join("items.ron");
        fs::write(&path, "[(name: ]").unwrap();

        let err = deserialize_list::<ItemData>(&path, "items").unwrap_err();
        match err {
            DataLoadError::Parse { file, .. } => assert_eq!(file, path),
            other => panic!("expected Parse, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn resolve_and_duplicate_helpers() {
        let mut map = HashMap::new();
        map.insert("stone".to_string(), 1u32);
        let file = Path::new("recipes.json");

        assert_eq!(*resolve_name(&map, "stone", file, "item").unwrap(), 1);
        assert!(matches!(
            resolve_name(&map, "iron", file, "item"),
            Err(DataLoadError::UnresolvedRef { expected_kind: "item", .. })
        ));
        assert!(check_duplicate(&map, "iron", file).is_ok());
        assert!(matches!(
            check_duplicate(&map, "stone", file),
            Err(DataLoadError::DuplicateName { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Full pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn load_minimal_json_content() {
        let dir = make_test_dir("load_minimal");
        write_core_files(&dir);

        let data = load_game_data(&dir).unwrap();
        let catalog = &data.catalog;
        assert_eq!(catalog.item_count(), 3);
        assert_eq!(catalog.recipe_count(), 2);
        assert_eq!(catalog.machine_count(), 2);
        assert_eq!(catalog.link_count(), 0);
        assert_eq!(data.config, SimConfig::default());

        let crusher = catalog.machine(catalog.machine_id("rock_crusher").unwrap()).unwrap();
        assert_eq!(crusher.name, "Rock Crusher");
        assert_eq!(crusher.nodes[0].capacity, DEFAULT_NODE_CAPACITY);
        assert_eq!(crusher.nodes[1].capacity, 4);
        assert_eq!(crusher.nodes[0].offset.0, f64_to_fixed64(-1.0));

        let boiler = catalog.machine(catalog.machine_id("boiler").unwrap()).unwrap();
        assert_eq!(boiler.name, "boiler");
        assert_eq!(boiler.components[0].type_name(), "RecipeRunner");
        assert_eq!(boiler.components[1].type_name(), "PowerProducer");
        match &boiler.components[0] {
            ComponentSpec::RecipeRunner { forced_recipe, .. } => {
                assert_eq!(*forced_recipe, catalog.recipe_id("burn_gravel"));
            }
            other => panic!("expected RecipeRunner, got {other:?}"),
        }

        let burn = catalog.recipe(catalog.recipe_id("burn_gravel").unwrap()).unwrap();
        assert_eq!(burn.output_kind, OutputKind::Energy);
        assert_eq!(burn.energy_output(), 40);
        cleanup(&dir);
    }

    #[test]
    fn load_optional_files_in_mixed_formats() {
        let dir = make_test_dir("load_optional");
        write_core_files(&dir);
        fs::write(
            dir.join("links.toml"),
            r#"
[[links]]
id = "conveyor"
type = "item"

[[links]]
id = "mv_cable"
type = "power"
voltage = "MV"
"#,
        )
        .unwrap();
        fs::write(
            dir.join("resources.ron"),
            r#"[(id: "stone_patch", size: (2, 2), drop_table: {"stone": 3.0, "gravel": 1.0}, amount: Some(50))]"#,
        )
        .unwrap();
        fs::write(dir.join("simulation.json"), r#"{"ticks_per_second": 20, "rng_seed": 7}"#).unwrap();

        let data = load_game_data(&dir).unwrap();
        let catalog = &data.catalog;

        let conveyor = catalog.link(catalog.link_id("conveyor").unwrap()).unwrap();
        assert_eq!(conveyor.kind, LinkKind::Item);
        assert_eq!(conveyor.transfer_quantity, 1);
        let cable = catalog.link(catalog.link_id("mv_cable").unwrap()).unwrap();
        assert_eq!(cable.voltage, Voltage::Mv);

        let patch = catalog.resource(catalog.resource_id("stone_patch").unwrap()).unwrap();
        assert_eq!(patch.size, (2, 2));
        assert_eq!(patch.amount, Some(50));
        assert_eq!(patch.drop_table[0].0, catalog.item_id("stone").unwrap());
        assert_eq!(patch.drop_table[0].1, f64_to_fixed64(3.0));

        assert_eq!(data.config.ticks_per_second, 20);
        assert_eq!(data.config.rng_seed, 7);
        assert_eq!(data.config.max_ticks_per_update, SimConfig::default().max_ticks_per_update);
        cleanup(&dir);
    }

    #[test]
    fn unresolved_item_in_recipe() {
        let dir = make_test_dir("unresolved_item");
        write_core_files(&dir);
        fs::write(
            dir.join("recipes.json"),
            r#"[{"id": "smelt", "inputs": {"iron_ore": 1}, "outputs": {"stone": 1}, "duration": 3}]"#,
        )
        .unwrap();

        match load_game_data(&dir).unwrap_err() {
            DataLoadError::UnresolvedRef { name, expected_kind, .. } => {
                assert_eq!(name, "iron_ore");
                assert_eq!(expected_kind, "item");
            }
            other => panic!("expected UnresolvedRef, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn unresolved_forced_recipe() {
        let dir = make_test_dir("unresolved_forced");
        write_core_files(&dir);
        fs::write(
            dir.join("machines.json"),
            r#"[{"id": "boiler", "components": {"RecipeRunner": {"forced_recipe": "nope"}}}]"#,
        )
        .unwrap();

        assert!(matches!(
            load_game_data(&dir),
            Err(DataLoadError::UnresolvedRef { expected_kind: "recipe", .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn duplicate_item_names() {
        let dir = make_test_dir("duplicate_items");
        write_core_files(&dir);
        fs::write(dir.join("items.json"), r#"[{"name": "stone"}, {"name": "stone"}]"#).unwrap();

        assert!(matches!(
            load_game_data(&dir),
            Err(DataLoadError::DuplicateName { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn unknown_component_and_missing_args() {
        let dir = make_test_dir("bad_component");
        write_core_files(&dir);

        fs::write(
            dir.join("machines.json"),
            r#"[{"id": "oven", "components": {"Furnace": {}}}]"#,
        )
        .unwrap();
        match load_game_data(&dir).unwrap_err() {
            DataLoadError::InvalidComponent { machine, component, .. } => {
                assert_eq!(machine, "oven");
                assert_eq!(component, "Furnace");
            }
            other => panic!("expected InvalidComponent, got {other:?}"),
        }

        fs::write(
            dir.join("machines.json"),
            r#"[{"id": "press", "components": {"PowerConsumer": {"idle_watts": 5}}}]"#,
        )
        .unwrap();
        match load_game_data(&dir).unwrap_err() {
            DataLoadError::InvalidComponent { detail, .. } => {
                assert_eq!(detail, "missing watts_required");
            }
            other => panic!("expected InvalidComponent, got {other:?}"),
        }
        cleanup(&dir);
    }

    #[test]
    fn catalog_validation_errors_surface() {
        let dir = make_test_dir("catalog_error");
        write_core_files(&dir);
        fs::write(
            dir.join("recipes.json"),
            r#"[{"id": "crush_stone", "inputs": {"stone": 1}, "outputs": {"gravel": 1},
                 "required_capabilities": ["welding"], "duration": 5}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("machines.json"),
            r#"[{"id": "rock_crusher", "components": {"RecipeRunner": {"capabilities": ["crushing"]}}}]"#,
        )
        .unwrap();

        assert!(matches!(load_game_data(&dir), Err(DataLoadError::Catalog(_))));
        cleanup(&dir);
    }
}
