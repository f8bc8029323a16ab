// src/engine/runtime.rs

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{Environment, ScheduledTarget, Scheduler, TargetRunState};
use crate::engine::summary::{FinalStatus, RunSummary};
use crate::engine::{CoreCommand, CoreRuntime, CoreStep, RuntimeEvent, TargetName};
use crate::errors::{Result, TargetdagError};
use crate::exec::{ExecContext, ExecutorBackend, RealExecutorBackend};
use crate::fs::RealFileSystem;
use crate::plan::{Plan, build_plan};
use crate::progress::{ProgressBoard, ProgressStatus};
use crate::store::records::value_hash;
use crate::store::{MetadataRecord, ObjectRecord, Outcome, Stores, Value};
use crate::workflow::Workflow;

/// Drives the scheduler in response to `RuntimeEvent`s and delegates
/// command execution to an `ExecutorBackend`.
///
/// All scheduling semantics live in `CoreRuntime`. This shell does the IO:
/// reading events from the channel, binding dependency values from the
/// object store, dispatching targets, and persisting results and progress.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    workflow: Arc<Workflow>,
    plan: Plan,
    stores: Stores,
    progress: ProgressBoard,
    /// Events generated by the shell itself (e.g. a dependency value that
    /// could not be loaded), handled before the channel is polled again.
    backlog: VecDeque<RuntimeEvent>,
    statuses: HashMap<TargetName, (FinalStatus, Option<f64>)>,
    /// Object hashes of the dependency values bound at dispatch.
    inputs: HashMap<TargetName, BTreeMap<TargetName, String>>,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        workflow: Arc<Workflow>,
        plan: Plan,
        stores: Stores,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
    ) -> Self {
        let last_run_id = stores.last_run_id().unwrap_or_else(|e| {
            warn!(error = %e, "unreadable run counter; numbering runs from 1");
            0
        });
        let core = CoreRuntime::new(Scheduler::new(&workflow, &plan).resume_after(last_run_id));
        let progress = ProgressBoard::new(stores.clone());
        Self {
            core,
            event_rx,
            executor,
            workflow,
            plan,
            stores,
            progress,
            backlog: VecDeque::new(),
            statuses: HashMap::new(),
            inputs: HashMap::new(),
        }
    }

    /// Report progress into `board` instead of a private one.
    pub fn with_progress(mut self, board: ProgressBoard) -> Self {
        self.progress = board;
        self
    }

    pub fn progress(&self) -> &ProgressBoard {
        &self.progress
    }

    /// Run every target (or only `only`) to a terminal state.
    pub async fn run(mut self, only: Option<HashSet<TargetName>>) -> Result<RunSummary> {
        info!("targetdag runtime started");

        let participants: Vec<&str> = self
            .workflow
            .graph()
            .targets()
            .filter(|name| only.as_ref().is_none_or(|set| set.contains(*name)))
            .collect();
        self.progress.reset(participants);

        let step = self.core.start(only.as_ref());
        let run_id = self.core.last_run_id();
        if let Err(e) = self.stores.write_last_run_id(run_id) {
            warn!(run_id, error = %e, "failed to persist the run counter");
        }
        let mut keep_running = self.apply(step).await?;

        while keep_running {
            let event = match self.backlog.pop_front() {
                Some(e) => e,
                None => match self.event_rx.recv().await {
                    Some(e) => e,
                    None => {
                        error!(run_id, "runtime event channel closed before the run finished");
                        break;
                    }
                },
            };

            let event = self.persist(event);
            let step = self.core.step(event);
            keep_running = self.apply(step).await?;
        }

        info!(run_id, "runtime exiting");
        Ok(RunSummary::collect(
            run_id,
            self.workflow.graph().targets(),
            self.statuses,
        ))
    }

    /// Store the result of a completed target before the scheduler sees it.
    ///
    /// A result that cannot be stored turns into an error, so dependents
    /// never start without a readable value.
    fn persist(&mut self, event: RuntimeEvent) -> RuntimeEvent {
        let (target, run_id, result, seconds) = match event {
            RuntimeEvent::TargetCompleted {
                target,
                run_id,
                result,
                seconds,
            } => (target, run_id, result, seconds),
            other => return other,
        };

        let accepted = self.core.current_run_id() == Some(run_id)
            && self.core.run_state_of(&target) == Some(TargetRunState::Running);
        if !accepted {
            return RuntimeEvent::TargetCompleted {
                target,
                run_id,
                result,
                seconds,
            };
        }

        let result = match result {
            Ok(value) => match self.store_success(&target, value.clone(), seconds) {
                Ok(()) => Ok(value),
                Err(e) => {
                    let message = format!("storing result failed: {e}");
                    self.store_error(&target, &message, seconds);
                    Err(message)
                }
            },
            Err(message) => {
                self.store_error(&target, &message, seconds);
                Err(message)
            }
        };

        match &result {
            Ok(_) => {
                self.statuses
                    .insert(target.clone(), (FinalStatus::Built, Some(seconds)));
                self.progress.mark_finished(&target, ProgressStatus::Success);
            }
            Err(message) => {
                self.statuses.insert(
                    target.clone(),
                    (
                        FinalStatus::Errored {
                            message: message.clone(),
                        },
                        Some(seconds),
                    ),
                );
                self.progress.mark_finished(&target, ProgressStatus::Errored);
            }
        }

        RuntimeEvent::TargetCompleted {
            target,
            run_id,
            result,
            seconds,
        }
    }

    fn metadata(&self, name: &str, outcome: Outcome, seconds: f64) -> MetadataRecord {
        let fp = self.plan.fingerprint(name);
        MetadataRecord {
            name: name.to_string(),
            fingerprint: fp.map(|f| f.fingerprint.clone()).unwrap_or_default(),
            dependencies: fp.map(|f| f.dependencies.clone()).unwrap_or_default(),
            globals: fp.map(|f| f.globals.clone()).unwrap_or_default(),
            inputs: self.inputs.get(name).cloned().unwrap_or_default(),
            format: self
                .workflow
                .target(name)
                .map(|t| t.format)
                .unwrap_or_default(),
            outcome,
            recorded_at: Utc::now(),
            seconds,
        }
    }

    fn store_success(&self, name: &str, value: Value, seconds: f64) -> Result<()> {
        let object = ObjectRecord::new(name, value);
        let meta = self.metadata(name, Outcome::Success, seconds);
        self.stores.record_success(&object, &meta)
    }

    fn store_error(&self, name: &str, message: &str, seconds: f64) {
        let meta = self.metadata(
            name,
            Outcome::Errored {
                message: message.to_string(),
            },
            seconds,
        );
        if let Err(e) = self.stores.record_error(&meta) {
            error!(target = %name, error = %e, "failed to store error metadata");
        }
    }

    /// Execute the commands of one core step. Returns whether to continue.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTargets(targets) => self.dispatch(targets).await?,
                CoreCommand::RecordSkipped(names) => {
                    for name in names {
                        self.progress.mark_finished(&name, ProgressStatus::Skipped);
                        self.statuses.insert(name, (FinalStatus::Skipped, None));
                    }
                }
                CoreCommand::RecordCanceled(names) => {
                    for name in names {
                        self.progress.mark_finished(&name, ProgressStatus::Canceled);
                        self.statuses.insert(name, (FinalStatus::Canceled, None));
                    }
                }
                CoreCommand::CancelRunning => self.executor.cancel_running().await?,
                CoreCommand::RequestExit => debug!("core issued RequestExit command"),
            }
        }
        Ok(step.keep_running)
    }

    /// Bind dependency values and hand the targets to the executor.
    async fn dispatch(&mut self, targets: Vec<ScheduledTarget>) -> Result<()> {
        let mut ready = Vec::with_capacity(targets.len());

        for mut target in targets {
            match self.load_environment(&target) {
                Ok(env) => {
                    let hashes = env
                        .iter()
                        .map(|(dep, value)| (dep.clone(), value_hash(value)))
                        .collect();
                    self.inputs.insert(target.name.clone(), hashes);
                    target.env = env;
                    self.progress.mark_running(&target.name);
                    ready.push(target);
                }
                Err(e) => {
                    warn!(target = %target.name, error = %e, "cannot bind dependency values");
                    self.backlog.push_back(RuntimeEvent::TargetCompleted {
                        target: target.name,
                        run_id: target.run_id,
                        result: Err(e.to_string()),
                        seconds: 0.0,
                    });
                }
            }
        }

        if ready.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = ready.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready targets");
        self.executor.spawn_ready_targets(ready).await
    }

    fn load_environment(&self, target: &ScheduledTarget) -> Result<Environment> {
        let mut env = Environment::new();
        for dep in &target.deps {
            let value = self.stores.read_value(dep)?;
            env.insert(dep.clone(), value);
        }
        Ok(env)
    }
}

/// Expand a `--names` selection to the selected targets plus their ancestors.
pub fn resolve_selection(workflow: &Workflow, names: &[String]) -> Result<HashSet<TargetName>> {
    if let Some(unknown) = names.iter().find(|n| !workflow.contains(n)) {
        return Err(TargetdagError::UnresolvedReference(unknown.clone()));
    }
    Ok(workflow.graph().with_ancestors(names))
}

/// Plan and execute `workflow` with shell processes.
///
/// Ctrl-C cancels pending targets and kills running ones; the summary is
/// still returned.
pub async fn run_workflow(
    workflow: Arc<Workflow>,
    stores: Stores,
    selection: Option<&[String]>,
) -> Result<RunSummary> {
    let only = selection
        .map(|names| resolve_selection(&workflow, names))
        .transpose()?;
    let plan = build_plan(&workflow, &stores, &RealFileSystem)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);
    let executor = RealExecutorBackend::new(rt_tx.clone(), ExecContext::for_workflow(&workflow));

    // Ctrl-C → graceful shutdown.
    let signal_task = {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    };
    drop(rt_tx);

    let runtime = Runtime::new(workflow, plan, stores, rt_rx, executor);
    let summary = runtime.run(only).await;
    signal_task.abort();
    summary
}
