pub mod builders;
pub mod fake_executor;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

use targetdag::engine::{Runtime, RuntimeEvent, RunSummary};
use targetdag::fs::mock::MockFileSystem;
use targetdag::plan::build_plan;
use targetdag::progress::ProgressBoard;
use targetdag::store::Stores;
use targetdag::workflow::Workflow;

use crate::fake_executor::{Behaviour, ExecutionLog, FakeExecutor};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Outcome of [`run_fake`].
pub struct FakeRun {
    pub summary: RunSummary,
    pub log: Arc<Mutex<ExecutionLog>>,
    pub progress: ProgressBoard,
}

impl FakeRun {
    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().executed.clone()
    }

    pub fn batches(&self) -> Vec<Vec<String>> {
        self.log.lock().unwrap().batches.clone()
    }
}

/// Plan and run `workflow` against `stores` with an in-process executor.
///
/// File-format targets are not supported here (the plan sees an empty mock
/// filesystem).
pub async fn run_fake(
    workflow: &Workflow,
    stores: &Stores,
    behaviour: Behaviour,
    only: Option<HashSet<String>>,
) -> anyhow::Result<FakeRun> {
    let plan = build_plan(workflow, stores, &MockFileSystem::new())?;

    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = FakeExecutor::new(tx, behaviour);
    let log = executor.log();
    let progress = ProgressBoard::new(stores.clone());

    let runtime = Runtime::new(Arc::new(workflow.clone()), plan, stores.clone(), rx, executor)
        .with_progress(progress.clone());
    let summary = with_timeout(runtime.run(only)).await?;

    Ok(FakeRun {
        summary,
        log,
        progress,
    })
}
