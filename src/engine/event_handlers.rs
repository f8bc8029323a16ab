// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::dag::{ScheduledTarget, Scheduler, SchedulerStep};
use crate::engine::{TargetName, TargetOutcome};
use crate::store::Value;
use crate::store::records::value_hash;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these targets to the executor.
    DispatchTargets(Vec<ScheduledTarget>),
    /// These targets were up to date; report them as skipped.
    RecordSkipped(Vec<TargetName>),
    /// These targets will not run in this run.
    RecordCanceled(Vec<TargetName>),
    /// Kill every process still running.
    CancelRunning,
    /// The run is over; the shell should stop and report.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Start a run over every target, or only over `only`.
pub fn handle_run_start(
    scheduler: &mut Scheduler,
    only: Option<&HashSet<TargetName>>,
) -> CoreStep {
    let step = scheduler.start_new_run(only);
    debug!(
        scheduled = step.newly_scheduled.len(),
        skipped = step.newly_skipped.len(),
        "run started"
    );
    into_core_step(step)
}

/// Handle a target completion event.
///
/// A value means the command succeeded and its result was stored; an error
/// message means it failed (or its result could not be stored).
pub fn handle_target_completion(
    scheduler: &mut Scheduler,
    target: &str,
    result: &Result<Value, String>,
) -> CoreStep {
    let outcome = match result {
        Ok(value) => {
            scheduler.record_value_hash(target, value_hash(value));
            TargetOutcome::Built
        }
        Err(message) => TargetOutcome::Errored(message.clone()),
    };
    let step = scheduler.handle_completion(target, outcome);
    into_core_step(step)
}

/// Handle a shutdown request: cancel what has not finished and exit.
pub fn handle_shutdown(scheduler: &mut Scheduler) -> CoreStep {
    info!("shutdown requested; canceling remaining targets");
    let step = scheduler.abort_run();

    let mut commands = vec![CoreCommand::CancelRunning];
    if !step.newly_canceled.is_empty() {
        commands.push(CoreCommand::RecordCanceled(step.newly_canceled));
    }
    commands.push(CoreCommand::RequestExit);

    CoreStep {
        commands,
        keep_running: false,
    }
}

/// Translate a scheduler step into shell commands.
///
/// Skips and cancellations are reported before dispatch so that progress
/// reflects them by the time dependents start.
fn into_core_step(step: SchedulerStep) -> CoreStep {
    let mut commands = Vec::new();

    if !step.newly_skipped.is_empty() {
        commands.push(CoreCommand::RecordSkipped(step.newly_skipped));
    }
    if !step.newly_canceled.is_empty() {
        commands.push(CoreCommand::RecordCanceled(step.newly_canceled));
    }
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTargets(step.newly_scheduled));
    }

    let keep_running = !step.run_just_finished;
    if step.run_just_finished {
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
