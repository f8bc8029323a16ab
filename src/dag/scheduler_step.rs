// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::target_info::ScheduledTarget;
use crate::engine::TargetName;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Targets that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTarget>,
    /// Up-to-date targets skipped in this step.
    pub newly_skipped: Vec<TargetName>,
    /// Targets canceled in this step because of an upstream error, the
    /// `stop` policy or a shutdown.
    pub newly_canceled: Vec<TargetName>,
    /// Whether this step caused the current run to finish (i.e. the scheduler
    /// is now idle).
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub fn empty() -> Self {
        Self::default()
    }
}
