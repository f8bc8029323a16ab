// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in in-process callables (tests, library users)
//! while keeping the shell-process implementation in [`executor_loop`].
//!
//! Whatever the backend, every dispatched target must eventually produce a
//! `RuntimeEvent::TargetCompleted` unless it is canceled.
//!
//! [`executor_loop`]: crate::exec::executor_loop

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::dag::ScheduledTarget;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::executor_loop::{ExecutorMessage, spawn_executor};
use crate::exec::target_runner::ExecContext;

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Trait abstracting how scheduled targets are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given targets for execution. Their `env` is already
    /// bound to the dependency values.
    fn spawn_ready_targets(&mut self, targets: Vec<ScheduledTarget>) -> BackendFuture<'_>;

    /// Stop everything still running without reporting completions.
    fn cancel_running(&mut self) -> BackendFuture<'_> {
        Box::pin(async { Ok(()) })
    }
}

/// Shell-process backend used in production.
///
/// Wraps the executor loop spawned by [`spawn_executor`] and forwards
/// requests to it over an mpsc channel.
pub struct RealExecutorBackend {
    tx: mpsc::Sender<ExecutorMessage>,
}

impl RealExecutorBackend {
    /// Spawn the background executor loop, reporting to `runtime_tx`.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, ctx: ExecContext) -> Self {
        let tx = spawn_executor(runtime_tx, Arc::new(ctx));
        Self { tx }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_targets(&mut self, targets: Vec<ScheduledTarget>) -> BackendFuture<'_> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            for target in targets {
                tx.send(ExecutorMessage::Run(target))
                    .await
                    .map_err(|_| anyhow!("executor loop is gone"))?;
            }
            Ok(())
        })
    }

    fn cancel_running(&mut self) -> BackendFuture<'_> {
        let tx = self.tx.clone();
        Box::pin(async move {
            tx.send(ExecutorMessage::CancelAll)
                .await
                .map_err(|_| anyhow!("executor loop is gone"))?;
            Ok(())
        })
    }
}
