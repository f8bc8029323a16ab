use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use targetdag::dag::{Environment, ScheduledTarget};
use targetdag::engine::RuntimeEvent;
use targetdag::exec::{BackendFuture, ExecutorBackend};
use targetdag::store::Value;

/// In-process stand-in for a target command. Receives the scheduled target
/// with its bound environment and returns the value (or error message).
pub type Behaviour = Arc<dyn Fn(&ScheduledTarget) -> Result<Value, String> + Send + Sync>;

/// Default behaviour: `"<name>(<dep>=<value>,...)"`, so dependents can see
/// exactly which upstream values they were handed.
pub fn echo_behaviour() -> Behaviour {
    Arc::new(|t: &ScheduledTarget| Ok(Value::Text(describe(&t.name, &t.env))))
}

/// Like [`echo_behaviour`], but the listed targets fail.
pub fn failing_behaviour(failing: &[&str]) -> Behaviour {
    let failing: Vec<String> = failing.iter().map(|s| s.to_string()).collect();
    Arc::new(move |t: &ScheduledTarget| {
        if failing.contains(&t.name) {
            Err(format!("{} failed on purpose", t.name))
        } else {
            Ok(Value::Text(describe(&t.name, &t.env)))
        }
    })
}

pub fn describe(name: &str, env: &Environment) -> String {
    let deps: Vec<String> = env
        .iter()
        .map(|(k, v)| format!("{k}={}", v.to_env_string()))
        .collect();
    format!("{name}({})", deps.join(","))
}

/// What the fake executor saw.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    /// Target names in dispatch order.
    pub executed: Vec<String>,
    /// Targets handed over together in one dispatch.
    pub batches: Vec<Vec<String>>,
    /// Environment each target was dispatched with.
    pub envs: HashMap<String, Environment>,
    /// Number of `cancel_running` calls.
    pub cancels: usize,
}

/// A fake executor that:
/// - records which targets were "run" and with which environment
/// - reports `TargetCompleted` with the result of its [`Behaviour`].
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    behaviour: Behaviour,
    log: Arc<Mutex<ExecutionLog>>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, behaviour: Behaviour) -> Self {
        Self {
            runtime_tx,
            behaviour,
            log: Arc::new(Mutex::new(ExecutionLog::default())),
        }
    }

    /// Shared handle to the log; stays valid after the executor is moved
    /// into a runtime.
    pub fn log(&self) -> Arc<Mutex<ExecutionLog>> {
        Arc::clone(&self.log)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_targets(&mut self, targets: Vec<ScheduledTarget>) -> BackendFuture<'_> {
        let tx = self.runtime_tx.clone();
        let behaviour = Arc::clone(&self.behaviour);
        let log = Arc::clone(&self.log);

        Box::pin(async move {
            let mut events = Vec::new();
            {
                let mut guard = log.lock().unwrap();
                guard
                    .batches
                    .push(targets.iter().map(|t| t.name.clone()).collect());
                for t in &targets {
                    guard.executed.push(t.name.clone());
                    guard.envs.insert(t.name.clone(), t.env.clone());
                    events.push(RuntimeEvent::TargetCompleted {
                        target: t.name.clone(),
                        run_id: t.run_id,
                        result: behaviour(t),
                        seconds: 0.0,
                    });
                }
            }

            // Completions are delivered from a separate task: the runtime is
            // not receiving while it awaits this future.
            tokio::spawn(async move {
                for event in events {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
            Ok(())
        })
    }

    fn cancel_running(&mut self) -> BackendFuture<'_> {
        let log = Arc::clone(&self.log);
        Box::pin(async move {
            log.lock().unwrap().cancels += 1;
            Ok(())
        })
    }
}
