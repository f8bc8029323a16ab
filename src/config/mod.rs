// src/config/mod.rs

//! Workflow definition loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workflow file from disk (`loader.rs`).
//! - Validate structural invariants: names, globals, `after` references
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_workflow, parse_str};
pub use model::{
    ConfigFile, ConfigSection, GlobalConfig, MAIN_NAMESPACE, RawConfigFile, TargetConfig,
};
pub use validate::validate_config;
