// src/exec/executor_loop.rs

//! Main executor loop that manages running target processes.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTarget;
use crate::engine::RuntimeEvent;
use crate::exec::target_runner::{ExecContext, run_target};

/// Requests sent from the runtime to the executor loop.
#[derive(Debug)]
pub enum ExecutorMessage {
    Run(ScheduledTarget),
    /// Kill every running process (shutdown).
    CancelAll,
}

/// Internal handle for a currently-running target process.
///
/// - `cancel` is used by the executor to request that the process be stopped.
/// - `handle` is the Tokio task that is actually running the command.
struct ActiveTarget {
    cancel: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Each scheduled target is executed in its own Tokio task, and **per target
/// name there will never be more than one process running at the same time**:
/// a request for a target whose previous process is still alive is refused.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    ctx: Arc<ExecContext>,
) -> mpsc::Sender<ExecutorMessage> {
    let (tx, mut rx) = mpsc::channel::<ExecutorMessage>(32);

    tokio::spawn(async move {
        info!("executor loop started");

        // At most one ActiveTarget per target name.
        let mut active: HashMap<String, ActiveTarget> = HashMap::new();

        while let Some(msg) = rx.recv().await {
            match msg {
                ExecutorMessage::Run(target) => {
                    handle_scheduled_target(target, &mut active, &runtime_tx, &ctx).await;
                }
                ExecutorMessage::CancelAll => cancel_all(&mut active),
            }
        }

        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Handle a newly scheduled target.
async fn handle_scheduled_target(
    target: ScheduledTarget,
    active: &mut HashMap<String, ActiveTarget>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    ctx: &Arc<ExecContext>,
) {
    let name = target.name.clone();

    if let Some(existing) = active.get(&name) {
        if !existing.handle.is_finished() {
            warn!(
                target = %name,
                run_id = target.run_id,
                "target already running; refusing a second process"
            );
            let _ = runtime_tx
                .send(RuntimeEvent::TargetCompleted {
                    target: name,
                    run_id: target.run_id,
                    result: Err("another process for this target is still running".to_string()),
                    seconds: 0.0,
                })
                .await;
            return;
        }
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let rt_tx = runtime_tx.clone();
    let ctx = Arc::clone(ctx);
    let spawn_name = name.clone();

    let handle = tokio::spawn(async move {
        run_target(target, ctx, rt_tx, cancel_rx).await;
        debug!(target = %spawn_name, "target runner future finished");
    });

    active.insert(
        name,
        ActiveTarget {
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_all(active: &mut HashMap<String, ActiveTarget>) {
    for (name, entry) in active.iter_mut() {
        if entry.handle.is_finished() {
            continue;
        }
        if let Some(cancel) = entry.cancel.take() {
            info!(target = %name, "canceling running process");
            if cancel.send(()).is_err() {
                debug!(target = %name, "process already finished while canceling");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::dag::Environment;
    use crate::types::StorageFormat;

    fn sleeper(name: &str, seconds: u32) -> ScheduledTarget {
        ScheduledTarget {
            name: name.to_string(),
            command: format!("sleep {seconds}; echo done"),
            format: StorageFormat::Text,
            deps: Vec::new(),
            env: Environment::new(),
            run_id: 1,
        }
    }

    fn context(dir: &tempfile::TempDir) -> Arc<ExecContext> {
        Arc::new(ExecContext {
            prelude: String::new(),
            root_dir: dir.path().to_path_buf(),
        })
    }

    #[tokio::test]
    async fn second_run_of_a_live_target_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let (rt_tx, mut rt_rx) = mpsc::channel(8);
        let exec_tx = spawn_executor(rt_tx, context(&dir));

        exec_tx.send(ExecutorMessage::Run(sleeper("slow", 5))).await.unwrap();
        exec_tx.send(ExecutorMessage::Run(sleeper("slow", 5))).await.unwrap();

        let event = timeout(Duration::from_secs(2), rt_rx.recv())
            .await
            .expect("refusal arrives before the sleep ends")
            .unwrap();
        match event {
            RuntimeEvent::TargetCompleted { target, result, .. } => {
                assert_eq!(target, "slow");
                assert!(result.unwrap_err().contains("still running"));
            }
            other => panic!("unexpected event {other:?}"),
        }

        exec_tx.send(ExecutorMessage::CancelAll).await.unwrap();
    }

    #[tokio::test]
    async fn cancel_all_kills_without_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (rt_tx, mut rt_rx) = mpsc::channel(8);
        let exec_tx = spawn_executor(rt_tx, context(&dir));

        exec_tx.send(ExecutorMessage::Run(sleeper("a", 30))).await.unwrap();
        exec_tx.send(ExecutorMessage::Run(sleeper("b", 30))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        exec_tx.send(ExecutorMessage::CancelAll).await.unwrap();

        // Dropping the sender ends the loop; once every runner task is gone
        // the event channel closes. A completion would show up first.
        drop(exec_tx);
        let next = timeout(Duration::from_secs(10), rt_rx.recv())
            .await
            .expect("killed processes release the channel well before 30s");
        assert!(next.is_none(), "got a completion for a canceled target: {next:?}");
    }
}
