// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::target_info::{RunState, TargetInfo, TargetRunState};
use crate::engine::{TargetName, TargetOutcome};
use crate::plan::Plan;
use crate::types::ErrorPolicy;
use crate::workflow::{RunSettings, Workflow};

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - remembering which targets are part of the current run
/// - deciding when a target is ready (all dependencies produced a value)
/// - skipping up-to-date targets and bounding concurrency by `workers`
/// - marking targets built / errored
/// - canceling descendants (or everything pending) when a target errors
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    targets: HashMap<TargetName, TargetInfo>,
    settings: RunSettings,
    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler for `workflow`, taking up-to-date decisions
    /// from `plan`.
    pub fn new(workflow: &Workflow, plan: &Plan) -> Self {
        let up_to_date: HashSet<TargetName> = workflow
            .targets()
            .iter()
            .filter(|t| plan.is_up_to_date(&t.name))
            .map(|t| t.name.clone())
            .collect();
        let mut scheduler = Self::with_up_to_date(workflow, &up_to_date);

        for info in scheduler.targets.values_mut() {
            info.value_hash = plan.value_hash(&info.name).map(str::to_string);
            if let Some(inputs) = plan.recorded_inputs(&info.name) {
                info.recorded_inputs = inputs.clone();
            }
        }
        scheduler
    }

    /// Construct a scheduler with an explicit set of up-to-date targets.
    pub fn with_up_to_date(workflow: &Workflow, up_to_date: &HashSet<TargetName>) -> Self {
        let graph = workflow.graph().clone();

        let mut targets = HashMap::new();
        for (order, name) in graph.topo_order().iter().enumerate() {
            let Some(def) = workflow.target(name) else {
                continue;
            };
            let deps = graph.dependencies_of(name).to_vec();
            let info = TargetInfo::from_def(def, order, deps, up_to_date.contains(name));
            targets.insert(name.clone(), info);
        }

        Self {
            graph,
            targets,
            settings: workflow.settings,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// Continue numbering runs after `last_run_id`.
    pub fn resume_after(mut self, last_run_id: u64) -> Self {
        self.run_counter = last_run_id;
        self
    }

    /// Current run ID, if any.
    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// ID of the most recently started run (0 before the first).
    pub fn last_run_id(&self) -> u64 {
        self.run_counter
    }

    /// Read-only view of the given target's run state.
    pub fn run_state_of(&self, target: &str) -> Option<TargetRunState> {
        let info = self.targets.get(target)?;
        Some(info.run_state.into())
    }

    /// Names of targets participating in the active run, in topological
    /// order. Empty when idle.
    pub fn targets_in_current_run(&self) -> Vec<TargetName> {
        if self.current_run_id.is_none() {
            return Vec::new();
        }

        self.graph
            .targets()
            .filter(|name| {
                self.targets
                    .get(*name)
                    .is_some_and(|info| info.run_state.is_some())
            })
            .map(str::to_string)
            .collect()
    }

    /// Whether the dependencies of `target` are satisfied for the current
    /// run. Returns `None` if the target is unknown.
    pub fn deps_satisfied(&self, target: &str) -> Option<bool> {
        let info = self.targets.get(target)?;
        let mgr = ReadOnlyStateManager::new(&self.targets);
        Some(mgr.deps_satisfied_for_info(info))
    }

    /// Target names in topological order.
    pub fn target_names(&self) -> impl Iterator<Item = &str> {
        self.graph.targets()
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    /// Start a new run over every target (or only `only`), releasing the
    /// first batch of ready targets.
    pub fn start_new_run(&mut self, only: Option<&HashSet<TargetName>>) -> SchedulerStep {
        if let Some(run_id) = self.current_run_id {
            warn!(run_id, "starting a new run while one is active; abandoning it");
        }

        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.targets.values_mut() {
            info.run_state = None;
        }

        info!(run_id = self.run_counter, "scheduler: starting new run");

        let mut manager = StateManager::new(&self.graph, &mut self.targets, self.current_run_id);
        manager.mark_pending(only);
        let released = manager.collect_new_ready_targets(self.settings.workers);
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled: released.scheduled,
            newly_skipped: released.skipped,
            newly_canceled: Vec::new(),
            run_just_finished,
        }
    }

    /// Remember the hash of the value a running target just produced.
    ///
    /// Dependents that are otherwise up to date compare it with the hash
    /// they were built from.
    pub fn record_value_hash(&mut self, target: &str, hash: String) {
        if let Some(info) = self.targets.get_mut(target) {
            if info.run_state == Some(RunState::Running) {
                info.value_hash = Some(hash);
            }
        }
    }

    /// Handle completion of a running target (production API).
    pub fn handle_completion(&mut self, target: &str, outcome: TargetOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(target = %target, "completion received with no active run; ignoring");
            return SchedulerStep::empty();
        };

        let mut newly_canceled = Vec::new();

        match self.targets.get_mut(target) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                TargetOutcome::Built => {
                    info.run_state = Some(RunState::Built);
                    info.last_built_run = Some(run_id);
                    debug!(target = %info.name, run_id, "target built");
                }
                TargetOutcome::Errored(message) => {
                    info.run_state = Some(RunState::Errored);
                    info.last_errored_run = Some(run_id);
                    warn!(
                        target = %info.name,
                        run_id,
                        error = %message,
                        "target errored; canceling dependents in this run"
                    );
                    let mut manager =
                        StateManager::new(&self.graph, &mut self.targets, self.current_run_id);
                    newly_canceled = manager.mark_descendants_canceled(target);
                    if self.settings.error_policy == ErrorPolicy::Stop {
                        info!(run_id, "error policy is stop; canceling all pending targets");
                        newly_canceled.extend(manager.cancel_all_pending());
                    }
                }
            },
            Some(info) => {
                warn!(
                    target = %target,
                    state = ?info.run_state,
                    "completion for target that is not running; ignoring"
                );
                return SchedulerStep::empty();
            }
            None => {
                warn!(target = %target, "completion for unknown target; ignoring");
                return SchedulerStep::empty();
            }
        }

        let mut manager = StateManager::new(&self.graph, &mut self.targets, self.current_run_id);
        let released = manager.collect_new_ready_targets(self.settings.workers);
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled: released.scheduled,
            newly_skipped: released.skipped,
            newly_canceled,
            run_just_finished,
        }
    }

    /// Cancel every pending target and treat running ones as canceled too
    /// (used on shutdown, when running processes are killed).
    pub fn abort_run(&mut self) -> SchedulerStep {
        if self.current_run_id.is_none() {
            return SchedulerStep::empty();
        }

        let mut manager = StateManager::new(&self.graph, &mut self.targets, self.current_run_id);
        let mut newly_canceled = manager.cancel_all_pending();

        for info in self.targets.values_mut() {
            if info.run_state == Some(RunState::Running) {
                info.run_state = Some(RunState::Canceled);
                newly_canceled.push(info.name.clone());
            }
        }

        let run_just_finished = self.maybe_finish_run();
        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_skipped: Vec::new(),
            newly_canceled,
            run_just_finished,
        }
    }

    /// Determine whether all targets are terminal and clear
    /// `current_run_id` if so.
    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(&self.graph, &mut self.targets, self.current_run_id);

        if manager.all_targets_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all targets terminal; marking run as finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }
}
