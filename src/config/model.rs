// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{BackendKind, Cue, ErrorPolicy, StorageFormat};

/// Namespace that is always tracked and wins every name collision.
pub const MAIN_NAMESPACE: &str = "main";

/// Top-level workflow definition as read from a TOML file.
///
/// ```toml
/// [config]
/// workers = 2
/// imports = ["helpers"]
///
/// [[global]]
/// name = "clean"
/// function = "tr -d ' '"
///
/// [[target]]
/// name = "raw"
/// command = "cat data.csv"
///
/// [[target]]
/// name = "cleaned"
/// command = "echo \"$raw\" | clean"
/// ```
///
/// Targets and globals are arrays of tables so declaration order survives
/// deserialization; the graph uses it to break topological ties.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub global: Vec<GlobalConfig>,

    #[serde(default)]
    pub target: Vec<TargetConfig>,
}

/// A [`RawConfigFile`] that passed validation.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub global: Vec<GlobalConfig>,
    pub target: Vec<TargetConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        global: Vec<GlobalConfig>,
        target: Vec<TargetConfig>,
    ) -> Self {
        Self {
            config,
            global,
            target,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Worker pool size. `1` means targets run one at a time.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// `"continue"` or `"stop"`.
    #[serde(default)]
    pub error: ErrorPolicy,

    /// Opted-in namespaces, highest precedence first.
    ///
    /// Globals in namespaces listed neither here nor as `main` are still
    /// available to commands but are not tracked for invalidation.
    #[serde(default)]
    pub imports: Vec<String>,

    /// Store directory, relative to the workflow file.
    #[serde(default = "default_store")]
    pub store: PathBuf,

    #[serde(default)]
    pub backend: BackendKind,
}

fn default_workers() -> usize {
    1
}

fn default_store() -> PathBuf {
    PathBuf::from(".targetdag")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            error: ErrorPolicy::default(),
            imports: Vec::new(),
            store: default_store(),
            backend: BackendKind::default(),
        }
    }
}

/// `[[global]]` entry: a helper function or value outside the target graph.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub name: String,

    /// Shell function body.
    #[serde(default)]
    pub function: Option<String>,

    /// Plain value, exported as a shell variable.
    #[serde(default)]
    pub value: Option<String>,
}

fn default_namespace() -> String {
    MAIN_NAMESPACE.to_string()
}

/// `[[target]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    pub name: String,

    /// Shell command producing the target's value on stdout.
    pub command: String,

    #[serde(default)]
    pub format: StorageFormat,

    /// Extra dependencies on top of the ones found by static analysis.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub cue: Cue,

    /// Free-form text shown by `manifest`. Not part of the fingerprint.
    #[serde(default)]
    pub description: Option<String>,
}
