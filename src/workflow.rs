// src/workflow.rs

//! Resolved workflow: target declarations, the symbol table, the analyzed
//! dependencies of every command and the resulting graph.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::analysis::{Dependencies, GlobalObject, SymbolTable, analyze_command};
use crate::config::model::{ConfigFile, TargetConfig};
use crate::dag::DagGraph;
use crate::errors::{Result, TargetdagError};
use crate::types::{BackendKind, Cue, ErrorPolicy, StorageFormat};

/// One target declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDef {
    pub name: String,
    pub command: String,
    pub format: StorageFormat,
    pub after: Vec<String>,
    pub cue: Cue,
    pub description: Option<String>,
}

impl TargetDef {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            format: StorageFormat::default(),
            after: Vec::new(),
            cue: Cue::default(),
            description: None,
        }
    }

    pub fn from_config(cfg: &TargetConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            command: cfg.command.clone(),
            format: cfg.format,
            after: cfg.after.clone(),
            cue: cfg.cue,
            description: cfg.description.clone(),
        }
    }
}

/// Execution settings taken from `[config]` (and overridable from the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    pub workers: usize,
    pub error_policy: ErrorPolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            error_policy: ErrorPolicy::Continue,
        }
    }
}

/// Where the stores live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub dir: PathBuf,
    pub backend: BackendKind,
}

#[derive(Debug, Clone)]
pub struct Workflow {
    targets: Vec<TargetDef>,
    symbols: SymbolTable,
    deps: HashMap<String, Dependencies>,
    graph: DagGraph,
    pub settings: RunSettings,
    pub store: StoreSettings,
    /// Directory commands run in and relative paths resolve against.
    pub root_dir: PathBuf,
}

impl Workflow {
    /// Analyze every command against `symbols` and build the graph.
    ///
    /// Target names are added to `symbols` here. Fails on cycles.
    pub fn new(
        targets: Vec<TargetDef>,
        mut symbols: SymbolTable,
        settings: RunSettings,
        store: StoreSettings,
        root_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if settings.workers == 0 {
            return Err(TargetdagError::ConfigError(
                "workers must be >= 1 (got 0)".to_string(),
            ));
        }

        for t in targets.iter() {
            if symbols.is_target(&t.name) {
                return Err(TargetdagError::ConfigError(format!(
                    "target '{}' is declared more than once",
                    t.name
                )));
            }
            symbols.add_target(&t.name);
        }
        for t in targets.iter() {
            if let Some(unknown) = t.after.iter().find(|d| !symbols.is_target(d)) {
                return Err(TargetdagError::ConfigError(format!(
                    "target '{}' has unknown dependency '{}' in `after`",
                    t.name, unknown
                )));
            }
        }

        let mut deps = HashMap::new();
        for t in targets.iter() {
            let mut found = analyze_command(&t.command, &symbols, Some(&t.name));
            for extra in t.after.iter() {
                if !found.targets.contains(extra) {
                    found.targets.push(extra.clone());
                }
            }
            found.targets.sort();
            debug!(
                target = %t.name,
                deps = ?found.targets,
                globals = ?found.globals,
                "analyzed target command"
            );
            deps.insert(t.name.clone(), found);
        }

        let graph = DagGraph::build(
            targets
                .iter()
                .map(|t| (t.name.as_str(), deps[&t.name].targets.clone())),
        )?;

        let root_dir: PathBuf = root_dir.into();
        let store = StoreSettings {
            dir: if store.dir.is_relative() {
                root_dir.join(&store.dir)
            } else {
                store.dir
            },
            backend: store.backend,
        };

        Ok(Self {
            targets,
            symbols,
            deps,
            graph,
            settings,
            store,
            root_dir,
        })
    }

    /// Build from a validated config file rooted at `root_dir`.
    pub fn from_config(cfg: &ConfigFile, root_dir: impl AsRef<Path>) -> Result<Self> {
        let mut symbols = SymbolTable::new(&cfg.config.imports);
        for g in cfg.global.iter() {
            symbols.add_global(GlobalObject::from_config(g));
        }

        let targets = cfg.target.iter().map(TargetDef::from_config).collect();
        let settings = RunSettings {
            workers: cfg.config.workers,
            error_policy: cfg.config.error,
        };
        let store = StoreSettings {
            dir: cfg.config.store.clone(),
            backend: cfg.config.backend,
        };

        Self::new(targets, symbols, settings, store, root_dir.as_ref())
    }

    /// Declarations in definition order.
    pub fn targets(&self) -> &[TargetDef] {
        &self.targets
    }

    pub fn target(&self, name: &str) -> Option<&TargetDef> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Analyzed dependencies (including `after`) of a target.
    pub fn dependencies(&self, name: &str) -> Option<&Dependencies> {
        self.deps.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.deps.contains_key(name)
    }
}
