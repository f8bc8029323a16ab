// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running target commands, using
//! `tokio::process::Command`, and reporting back to the orchestration
//! runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the loop which manages target processes.
//! - [`target_runner`] runs one process and turns its stdout into a value.
//! - [`prelude`] renders global definitions into a shell prelude.
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `RealExecutorBackend` used in production, which tests can replace with
//!   a fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod prelude;
pub mod target_runner;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use target_runner::ExecContext;
