// src/plan/outdated.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::plan::fingerprint::{TargetFingerprint, compute_fingerprints};
use crate::store::hash::compute_file_hash;
use crate::store::{MetadataRecord, ObjectRecord, Outcome, Stores, Value};
use crate::types::Cue;
use crate::workflow::{TargetDef, Workflow};

/// Why a target has to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No metadata record (never built, or invalidated).
    NoMetadata,
    /// The last run errored.
    Errored,
    /// Command, options, globals or an upstream fingerprint changed.
    FingerprintChanged,
    /// Metadata says success but the object is gone (e.g. after `delete`).
    ObjectMissing,
    /// A `file` target's file is missing or its contents changed.
    FileChanged,
    /// `cue = "always"`.
    CueAlways,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StaleReason::NoMetadata => "no metadata",
            StaleReason::Errored => "errored last run",
            StaleReason::FingerprintChanged => "fingerprint changed",
            StaleReason::ObjectMissing => "object missing",
            StaleReason::FileChanged => "file changed",
            StaleReason::CueAlways => "cue = always",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    UpToDate,
    Outdated(StaleReason),
}

impl Staleness {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Staleness::UpToDate)
    }
}

/// Fingerprints and staleness of every target, computed before a run.
///
/// `value_hashes` and `recorded_inputs` let the scheduler notice, once the
/// dependencies of an up-to-date target have settled, that one of them now
/// holds a different value than the one the target was built from.
#[derive(Debug, Clone)]
pub struct Plan {
    pub fingerprints: HashMap<String, TargetFingerprint>,
    pub staleness: HashMap<String, Staleness>,
    /// Hash of each target's stored object.
    pub value_hashes: HashMap<String, String>,
    /// Dependency object hashes each target was last built from.
    pub recorded_inputs: HashMap<String, BTreeMap<String, String>>,
}

impl Plan {
    pub fn is_up_to_date(&self, name: &str) -> bool {
        self.staleness
            .get(name)
            .is_some_and(Staleness::is_up_to_date)
    }

    pub fn fingerprint(&self, name: &str) -> Option<&TargetFingerprint> {
        self.fingerprints.get(name)
    }

    pub fn value_hash(&self, name: &str) -> Option<&str> {
        self.value_hashes.get(name).map(String::as_str)
    }

    pub fn recorded_inputs(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.recorded_inputs.get(name)
    }
}

/// Compute fingerprints and compare them with the stores.
pub fn build_plan(workflow: &Workflow, stores: &Stores, fs: &dyn FileSystem) -> Result<Plan> {
    let fingerprints = compute_fingerprints(workflow);
    let mut staleness = HashMap::new();
    let mut value_hashes = HashMap::new();
    let mut recorded_inputs = HashMap::new();

    for name in workflow.graph().targets() {
        let (Some(def), Some(fp)) = (workflow.target(name), fingerprints.get(name)) else {
            continue;
        };
        let meta = load_metadata(stores, name);
        let object = load_object(stores, name);

        let state = staleness_of(
            def,
            fp,
            meta.as_ref(),
            object.as_ref(),
            fs,
            &workflow.root_dir,
        );
        debug!(target = %name, state = ?state, "computed staleness");
        staleness.insert(name.to_string(), state);

        if let Some(object) = object {
            value_hashes.insert(name.to_string(), object.hash);
        }
        if let Some(meta) = meta {
            recorded_inputs.insert(name.to_string(), meta.inputs);
        }
    }

    Ok(Plan {
        fingerprints,
        staleness,
        value_hashes,
        recorded_inputs,
    })
}

/// Names of the targets the next run would execute, in topological order.
pub fn outdated(workflow: &Workflow, stores: &Stores, fs: &dyn FileSystem) -> Result<Vec<String>> {
    let plan = build_plan(workflow, stores, fs)?;
    Ok(workflow
        .graph()
        .targets()
        .filter(|name| !plan.is_up_to_date(name))
        .map(str::to_string)
        .collect())
}

fn load_metadata(stores: &Stores, name: &str) -> Option<MetadataRecord> {
    stores.read_metadata(name).unwrap_or_else(|e| {
        warn!(target = %name, error = %e, "unreadable metadata; treating as missing");
        None
    })
}

fn load_object(stores: &Stores, name: &str) -> Option<ObjectRecord> {
    stores.raw_object(name).unwrap_or_else(|e| {
        warn!(target = %name, error = %e, "unreadable object; treating as missing");
        None
    })
}

fn staleness_of(
    def: &TargetDef,
    fp: &TargetFingerprint,
    meta: Option<&MetadataRecord>,
    object: Option<&ObjectRecord>,
    fs: &dyn FileSystem,
    root: &Path,
) -> Staleness {
    if def.cue == Cue::Always {
        return Staleness::Outdated(StaleReason::CueAlways);
    }

    let Some(meta) = meta else {
        return Staleness::Outdated(StaleReason::NoMetadata);
    };

    if let Outcome::Errored { .. } = meta.outcome {
        return Staleness::Outdated(StaleReason::Errored);
    }
    if def.cue == Cue::Thorough && meta.fingerprint != fp.fingerprint {
        return Staleness::Outdated(StaleReason::FingerprintChanged);
    }

    let Some(object) = object else {
        return Staleness::Outdated(StaleReason::ObjectMissing);
    };

    if def.cue == Cue::Thorough {
        if let Value::File { path, hash } = &object.value {
            let full = root.join(path);
            let current = if fs.is_file(&full) {
                compute_file_hash(fs, &full).ok()
            } else {
                None
            };
            if current.as_deref() != Some(hash.as_str()) {
                return Staleness::Outdated(StaleReason::FileChanged);
            }
        }
    }

    Staleness::UpToDate
}
