//! Data-driven content loading for Foundry.
//!
//! Reads items, recipes, machines, links, resource nodes and simulation
//! settings from RON, JSON or TOML files and resolves them into a frozen
//! [`foundry_core::catalog::Catalog`].

pub mod loader;
pub mod schema;

pub use loader::{load_game_data, DataLoadError, GameData};
