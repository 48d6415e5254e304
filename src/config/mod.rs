// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and register tasks, groups and watch bindings into a
//!   task graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str, project_root};
pub use model::{
    CleanConfig, ConfigFile, ConfigSection, GroupConfig, RawConfigFile, ReloadSection, TaskConfig,
    WatchConfig,
};
pub use validate::DEBOUNCE_RANGE_MS;
