// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] holds the directed acyclic graph of targets.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which targets are ready, skipped or canceled.
//! - [`target_info`] provides target metadata and scheduled target types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod target_info;

pub use graph::DagGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use target_info::{Environment, ScheduledTarget, TargetRunState};
