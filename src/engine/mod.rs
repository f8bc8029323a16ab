// src/engine/mod.rs

//! Orchestration engine for targetdag.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the runtime event loop that reacts to target completions and
//!   shutdown signals
//! - persistence of results and progress
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use crate::store::Value;

/// Canonical target name type used throughout the engine.
pub type TargetName = String;

/// Outcome of a target execution for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Built,
    Errored(String),
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A target finished executing. `result` holds the produced value or
    /// the error message.
    TargetCompleted {
        target: TargetName,
        run_id: u64,
        result: Result<Value, String>,
        seconds: f64,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod runtime;
pub mod summary;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
pub use summary::{FinalStatus, RunSummary};
