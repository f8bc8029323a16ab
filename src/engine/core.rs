// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - binding dependency values and sending `ScheduledTarget`s to the executor
//! - persisting results and progress
//!
//! The core is intended to be extensively unit tested without any Tokio,
//! channels, filesystem, or processes.

use std::collections::HashSet;

use tracing::warn;

use crate::dag::{Scheduler, TargetRunState};
use crate::engine::event_handlers::{
    CoreStep, handle_run_start, handle_shutdown, handle_target_completion,
};
use crate::engine::{RuntimeEvent, TargetName};

/// Pure core runtime state.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    /// Begin the run. `only` restricts it to a subset of targets.
    pub fn start(&mut self, only: Option<&HashSet<TargetName>>) -> CoreStep {
        handle_run_start(&mut self.scheduler, only)
    }

    /// Expose whether the scheduler is idle (for tests).
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.scheduler.current_run_id()
    }

    pub fn last_run_id(&self) -> u64 {
        self.scheduler.last_run_id()
    }

    pub fn run_state_of(&self, target: &str) -> Option<TargetRunState> {
        self.scheduler.run_state_of(target)
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TargetCompleted {
                target,
                run_id,
                result,
                ..
            } => {
                if self.scheduler.current_run_id() != Some(run_id) {
                    warn!(target = %target, run_id, "completion from another run; ignoring");
                    return CoreStep {
                        commands: Vec::new(),
                        keep_running: !self.scheduler.is_idle(),
                    };
                }
                handle_target_completion(&mut self.scheduler, &target, &result)
            }
            RuntimeEvent::ShutdownRequested => handle_shutdown(&mut self.scheduler),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::analysis::SymbolTable;
    use crate::engine::CoreCommand;
    use crate::store::Value;
    use crate::types::{BackendKind, ErrorPolicy};
    use crate::workflow::{RunSettings, StoreSettings, TargetDef, Workflow};

    fn core(up_to_date: &[&str]) -> CoreRuntime {
        let wf = Workflow::new(
            vec![
                TargetDef::new("a", "echo a"),
                TargetDef::new("b", "echo $a"),
                TargetDef::new("c", "echo $a"),
            ],
            SymbolTable::new(&[]),
            RunSettings {
                workers: 2,
                error_policy: ErrorPolicy::Continue,
            },
            StoreSettings {
                dir: PathBuf::from(".targetdag"),
                backend: BackendKind::Memory,
            },
            ".",
        )
        .unwrap();
        let up: HashSet<String> = up_to_date.iter().map(|s| s.to_string()).collect();
        CoreRuntime::new(Scheduler::with_up_to_date(&wf, &up))
    }

    fn completed(target: &str, result: Result<Value, String>) -> RuntimeEvent {
        RuntimeEvent::TargetCompleted {
            target: target.to_string(),
            run_id: 1,
            result,
            seconds: 0.0,
        }
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        step.commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTargets(ts) => Some(ts.iter().map(|t| t.name.clone())),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn run_dispatches_then_exits() {
        let mut core = core(&[]);

        let step = core.start(None);
        assert_eq!(dispatched(&step), vec!["a"]);
        assert!(step.keep_running);

        let step = core.step(completed("a", Ok(Value::Text("a".into()))));
        assert_eq!(dispatched(&step), vec!["b", "c"]);

        core.step(completed("b", Ok(Value::Text("b".into()))));
        let step = core.step(completed("c", Ok(Value::Text("c".into()))));
        assert!(!step.keep_running);
        assert!(matches!(step.commands.last(), Some(CoreCommand::RequestExit)));
        assert!(core.is_idle());
    }

    #[test]
    fn error_produces_cancel_commands() {
        let mut core = core(&[]);
        core.start(None);

        let step = core.step(completed("a", Err("exit status 1".into())));
        let canceled: Vec<String> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::RecordCanceled(names) => Some(names.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(canceled, vec!["b", "c"]);
        assert!(!step.keep_running);
    }

    #[test]
    fn all_up_to_date_finishes_immediately() {
        let mut core = core(&["a", "b", "c"]);
        let step = core.start(None);

        assert!(matches!(
            &step.commands[0],
            CoreCommand::RecordSkipped(names) if names == &vec!["a", "b", "c"]
        ));
        assert!(!step.keep_running);
    }

    #[test]
    fn shutdown_cancels_and_stops() {
        let mut core = core(&[]);
        core.start(None);

        let step = core.step(RuntimeEvent::ShutdownRequested);
        assert!(!step.keep_running);
        assert!(matches!(step.commands[0], CoreCommand::CancelRunning));
        assert_eq!(core.run_state_of("b"), Some(TargetRunState::Canceled));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let mut core = core(&[]);
        core.start(None);

        let step = core.step(RuntimeEvent::TargetCompleted {
            target: "a".into(),
            run_id: 7,
            result: Ok(Value::Text("x".into())),
            seconds: 0.0,
        });
        assert!(step.commands.is_empty());
        assert_eq!(core.run_state_of("a"), Some(TargetRunState::Running));
    }
}
