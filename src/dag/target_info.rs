// src/dag/target_info.rs

//! Target metadata and per-run state.

use std::collections::BTreeMap;

use crate::engine::TargetName;
use crate::store::Value;
use crate::types::StorageFormat;
use crate::workflow::TargetDef;

/// Per-run state of a target (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies or a free worker.
    Pending,
    /// Dispatched to the executor.
    Running,
    /// Executed successfully in this run.
    Built,
    /// Up to date; the stored object is reused.
    Skipped,
    /// The command failed in this run.
    Errored,
    /// Not executed because an upstream target errored (or the run stopped).
    Canceled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    /// Terminal states whose value dependents may consume.
    pub fn provides_value(&self) -> bool {
        matches!(self, RunState::Built | RunState::Skipped)
    }
}

/// Public, read-only view of a target's per-run state.
///
/// This is exposed for tests and diagnostics without leaking the internal
/// `RunState` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRunState {
    /// The target is not participating in this run.
    NotInRun,
    Pending,
    Running,
    Built,
    Skipped,
    Errored,
    Canceled,
}

impl From<Option<RunState>> for TargetRunState {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TargetRunState::NotInRun,
            Some(RunState::Pending) => TargetRunState::Pending,
            Some(RunState::Running) => TargetRunState::Running,
            Some(RunState::Built) => TargetRunState::Built,
            Some(RunState::Skipped) => TargetRunState::Skipped,
            Some(RunState::Errored) => TargetRunState::Errored,
            Some(RunState::Canceled) => TargetRunState::Canceled,
        }
    }
}

/// Static target information plus per-run state.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub name: TargetName,
    pub command: String,
    pub format: StorageFormat,
    /// Position in the topological order; dispatch happens in this order.
    pub order: usize,
    /// Direct dependencies.
    pub deps: Vec<TargetName>,
    /// Whether the stored result can be reused (decided by the plan).
    pub up_to_date: bool,
    /// Dependency object hashes this target was last built from.
    pub recorded_inputs: BTreeMap<TargetName, String>,
    /// Hash of the value this target currently holds, if any.
    pub value_hash: Option<String>,

    /// Per-run state (None if not participating in the current run).
    pub run_state: Option<RunState>,

    /// Last run ID in which this target was built.
    pub last_built_run: Option<u64>,

    /// Last run ID in which this target errored.
    pub last_errored_run: Option<u64>,
}

impl TargetInfo {
    pub fn from_def(def: &TargetDef, order: usize, deps: Vec<TargetName>, up_to_date: bool) -> Self {
        Self {
            name: def.name.clone(),
            command: def.command.clone(),
            format: def.format,
            order,
            deps,
            up_to_date,
            recorded_inputs: BTreeMap::new(),
            value_hash: None,
            run_state: None,
            last_built_run: None,
            last_errored_run: None,
        }
    }
}

/// Ordered mapping of dependency name to value handed to a command.
pub type Environment = BTreeMap<TargetName, Value>;

/// Description of a target that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTarget {
    pub name: TargetName,
    pub command: String,
    pub format: StorageFormat,
    pub deps: Vec<TargetName>,
    /// Dependency values, bound by the runtime right before dispatch.
    pub env: Environment,
    /// Monotonically increasing run identifier.
    pub run_id: u64,
}

impl ScheduledTarget {
    pub fn from_target_info(info: &TargetInfo, run_id: u64) -> Self {
        Self {
            name: info.name.clone(),
            command: info.command.clone(),
            format: info.format,
            deps: info.deps.clone(),
            env: Environment::new(),
            run_id,
        }
    }
}
