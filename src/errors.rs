// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TargetdagError {
    /// Malformed workflow definition. Fatal before any execution begins.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The dependency graph contains a cycle through the listed targets.
    #[error("Cycle detected in target graph: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// A reference to a symbol that is neither a target nor a tracked global.
    ///
    /// The analyzer ignores unknown symbols, so this only surfaces from
    /// explicit lookups such as `deps` on an undeclared target.
    #[error("Unresolved reference: {0}")]
    UnresolvedReference(String),

    /// Metadata and object records disagree for a target.
    #[error("Store inconsistency for target '{target}': {message}")]
    StoreInconsistency { target: String, message: String },

    #[error("Target '{0}' has never been built")]
    NeverBuilt(String),

    #[error("Target '{0}' is invalidated (object present without metadata)")]
    Invalidated(String),

    #[error("Target '{target}' errored in its last run: {message}")]
    TargetErrored { target: String, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TargetdagError>;
