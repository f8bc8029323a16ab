#![allow(dead_code)]

use std::path::PathBuf;

use targetdag::analysis::{GlobalObject, SymbolTable};
use targetdag::config::{ConfigSection, GlobalConfig, RawConfigFile, TargetConfig};
use targetdag::errors::Result;
use targetdag::types::{BackendKind, Cue, ErrorPolicy, StorageFormat};
use targetdag::workflow::{RunSettings, StoreSettings, TargetDef, Workflow};

/// Builder for a programmatic `Workflow`.
pub struct WorkflowBuilder {
    targets: Vec<TargetDef>,
    globals: Vec<GlobalObject>,
    imports: Vec<String>,
    settings: RunSettings,
    root: PathBuf,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            targets: Vec::new(),
            globals: Vec::new(),
            imports: Vec::new(),
            settings: RunSettings::default(),
            root: PathBuf::from("."),
        }
    }

    pub fn target(mut self, name: &str, command: &str) -> Self {
        self.targets.push(TargetDef::new(name, command));
        self
    }

    pub fn target_def(mut self, def: TargetDef) -> Self {
        self.targets.push(def);
        self
    }

    pub fn function(mut self, namespace: &str, name: &str, body: &str) -> Self {
        self.globals.push(GlobalObject::function(namespace, name, body));
        self
    }

    pub fn value(mut self, namespace: &str, name: &str, body: &str) -> Self {
        self.globals.push(GlobalObject::value(namespace, name, body));
        self
    }

    pub fn import(mut self, namespace: &str) -> Self {
        self.imports.push(namespace.to_string());
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.settings.workers = workers;
        self
    }

    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.settings.error_policy = policy;
        self
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn try_build(self) -> Result<Workflow> {
        let mut symbols = SymbolTable::new(&self.imports);
        for g in self.globals {
            symbols.add_global(g);
        }
        Workflow::new(
            self.targets,
            symbols,
            self.settings,
            StoreSettings {
                dir: PathBuf::from(".targetdag"),
                backend: BackendKind::Memory,
            },
            self.root,
        )
    }

    pub fn build(self) -> Workflow {
        self.try_build().expect("Failed to build valid workflow from builder")
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TargetDef`.
pub struct TargetBuilder {
    def: TargetDef,
}

impl TargetBuilder {
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            def: TargetDef::new(name, command),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.def.after.push(dep.to_string());
        self
    }

    pub fn format(mut self, format: StorageFormat) -> Self {
        self.def.format = format;
        self
    }

    pub fn cue(mut self, cue: Cue) -> Self {
        self.def.cue = cue;
        self
    }

    pub fn build(self) -> TargetDef {
        self.def
    }
}

/// Builder for the raw TOML model, used to exercise validation.
pub struct RawConfigBuilder {
    config: RawConfigFile,
}

impl RawConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                global: Vec::new(),
                target: Vec::new(),
            },
        }
    }

    pub fn target(mut self, name: &str, command: &str) -> Self {
        self.config.target.push(TargetConfig {
            name: name.to_string(),
            command: command.to_string(),
            format: StorageFormat::default(),
            after: Vec::new(),
            cue: Cue::default(),
            description: None,
        });
        self
    }

    pub fn target_after(mut self, name: &str, command: &str, after: &[&str]) -> Self {
        self = self.target(name, command);
        if let Some(last) = self.config.target.last_mut() {
            last.after = after.iter().map(|s| s.to_string()).collect();
        }
        self
    }

    pub fn global(mut self, global: GlobalConfig) -> Self {
        self.config.global.push(global);
        self
    }

    pub fn imports(mut self, imports: &[&str]) -> Self {
        self.config.config.imports = imports.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.config.workers = workers;
        self
    }

    pub fn build(self) -> RawConfigFile {
        self.config
    }
}

impl Default for RawConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
