// src/analysis/symbols.rs

//! Explicit symbol table handed to the analyzer and the executor.
//!
//! Resolution order for a name:
//! 1. target names,
//! 2. globals in the `main` namespace,
//! 3. globals in opted-in namespaces, in the order they were imported.
//!
//! Globals in any other namespace are kept (commands may still call them)
//! but never resolve, so they are not tracked as dependencies.

use std::collections::{HashMap, HashSet};

use blake3::Hasher;
use serde::Serialize;

use crate::config::model::{GlobalConfig, MAIN_NAMESPACE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalKind {
    Function,
    Value,
}

/// A helper function or value living outside the target graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalObject {
    pub namespace: String,
    pub name: String,
    pub kind: GlobalKind,
    pub body: String,
}

impl GlobalObject {
    pub fn function(namespace: &str, name: &str, body: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: GlobalKind::Function,
            body: body.to_string(),
        }
    }

    pub fn value(namespace: &str, name: &str, body: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind: GlobalKind::Value,
            body: body.to_string(),
        }
    }

    pub fn from_config(cfg: &GlobalConfig) -> Self {
        match (&cfg.function, &cfg.value) {
            (Some(body), _) => Self::function(&cfg.namespace, &cfg.name, body),
            (None, Some(body)) => Self::value(&cfg.namespace, &cfg.name, body),
            // Validation guarantees exactly one is set.
            (None, None) => Self::value(&cfg.namespace, &cfg.name, ""),
        }
    }

    /// `namespace::name`.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.namespace, self.name)
    }

    /// Content hash of this object's own definition.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update(&[0]);
        hasher.update(self.name.as_bytes());
        hasher.update(&[0]);
        hasher.update(format!("{:?}", self.kind).as_bytes());
        hasher.update(&[0]);
        hasher.update(self.body.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// What a name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol<'a> {
    Target(&'a str),
    Global(&'a GlobalObject),
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    targets: Vec<String>,
    target_set: HashSet<String>,
    globals: Vec<GlobalObject>,
    by_key: HashMap<(String, String), usize>,
    /// Tracked namespaces, highest precedence first (`main` is always first).
    tracked: Vec<String>,
}

impl SymbolTable {
    /// New table tracking `main` plus `imports` (highest precedence first).
    pub fn new(imports: &[String]) -> Self {
        let mut tracked = vec![MAIN_NAMESPACE.to_string()];
        for ns in imports {
            if !tracked.contains(ns) {
                tracked.push(ns.clone());
            }
        }
        Self {
            tracked,
            ..Self::default()
        }
    }

    pub fn add_target(&mut self, name: &str) {
        if self.target_set.insert(name.to_string()) {
            self.targets.push(name.to_string());
        }
    }

    /// Add (or replace) a global object.
    pub fn add_global(&mut self, object: GlobalObject) {
        let key = (object.namespace.clone(), object.name.clone());
        match self.by_key.get(&key) {
            Some(&idx) => self.globals[idx] = object,
            None => {
                self.by_key.insert(key, self.globals.len());
                self.globals.push(object);
            }
        }
    }

    pub fn is_target(&self, name: &str) -> bool {
        self.target_set.contains(name)
    }

    pub fn tracked_namespaces(&self) -> &[String] {
        &self.tracked
    }

    pub fn global(&self, namespace: &str, name: &str) -> Option<&GlobalObject> {
        self.by_key
            .get(&(namespace.to_string(), name.to_string()))
            .map(|&idx| &self.globals[idx])
    }

    /// Resolve `name` against targets first, then tracked globals.
    pub fn resolve(&self, name: &str) -> Option<Symbol<'_>> {
        if let Some(target) = self.targets.iter().find(|t| t.as_str() == name) {
            return Some(Symbol::Target(target.as_str()));
        }
        self.resolve_global(name).map(Symbol::Global)
    }

    /// Resolve `name` against tracked globals only.
    pub fn resolve_global(&self, name: &str) -> Option<&GlobalObject> {
        self.tracked
            .iter()
            .find_map(|ns| self.global(ns, name))
    }

    /// Every global, lowest precedence first: untracked namespaces, then
    /// imports from last to first, then `main`.
    ///
    /// Emitting definitions in this order lets the highest-precedence
    /// definition of a name win at execution time.
    pub fn globals_by_ascending_precedence(&self) -> Vec<&GlobalObject> {
        let rank = |g: &GlobalObject| -> usize {
            match self.tracked.iter().position(|ns| ns == &g.namespace) {
                Some(pos) => self.tracked.len() - pos,
                None => 0,
            }
        };

        let mut out: Vec<&GlobalObject> = self.globals.iter().collect();
        // Stable sort keeps declaration order within a namespace.
        out.sort_by_key(|g| rank(g));
        out
    }
}
