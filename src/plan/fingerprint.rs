// src/plan/fingerprint.rs

//! Static target fingerprints.
//!
//! A fingerprint covers the command text, the storage format, the explicit
//! `after` list, the fingerprints of every tracked global in the command's
//! closure and the fingerprints of the direct dependencies. Because the last
//! term is itself a fingerprint, a change anywhere upstream propagates to
//! every descendant.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::store::hash::hash_bytes;
use crate::types::StorageFormat;
use crate::workflow::Workflow;

/// Shape that is canonicalized (JSON, sorted maps) and hashed.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    command: &'a str,
    format: StorageFormat,
    after: Vec<&'a str>,
    globals: &'a BTreeMap<String, String>,
    dependencies: &'a BTreeMap<String, String>,
}

/// A target's fingerprint plus the inputs it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFingerprint {
    pub fingerprint: String,
    pub dependencies: BTreeMap<String, String>,
    pub globals: BTreeMap<String, String>,
}

/// Fingerprint every target of `workflow`, walking it in topological order.
pub fn compute_fingerprints(workflow: &Workflow) -> HashMap<String, TargetFingerprint> {
    let mut out: HashMap<String, TargetFingerprint> = HashMap::new();

    for name in workflow.graph().targets() {
        let Some(def) = workflow.target(name) else {
            continue;
        };

        let dependencies: BTreeMap<String, String> = workflow
            .graph()
            .dependencies_of(name)
            .iter()
            .map(|dep| {
                let fp = out
                    .get(dep)
                    .map(|f| f.fingerprint.clone())
                    .unwrap_or_default();
                (dep.clone(), fp)
            })
            .collect();

        let globals: BTreeMap<String, String> = workflow
            .dependencies(name)
            .map(|d| d.globals.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|qualified| {
                let (ns, global) = qualified.split_once("::")?;
                let object = workflow.symbols().global(ns, global)?;
                Some((qualified.clone(), object.fingerprint()))
            })
            .collect();

        let mut after: Vec<&str> = def.after.iter().map(String::as_str).collect();
        after.sort_unstable();

        let input = FingerprintInput {
            command: &def.command,
            format: def.format,
            after,
            globals: &globals,
            dependencies: &dependencies,
        };
        // Serializing plain strings and maps cannot fail.
        let bytes = serde_json::to_vec(&input).unwrap_or_default();

        out.insert(
            name.to_string(),
            TargetFingerprint {
                fingerprint: hash_bytes(&bytes),
                dependencies,
                globals,
            },
        );
    }

    out
}
