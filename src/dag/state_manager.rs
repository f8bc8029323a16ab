// src/dag/state_manager.rs

//! Per-run state management for targets in the scheduler.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::DagGraph;
use crate::dag::target_info::{RunState, ScheduledTarget, TargetInfo};
use crate::engine::TargetName;

/// Targets released by one call to [`StateManager::collect_new_ready_targets`].
#[derive(Debug, Default)]
pub struct Released {
    pub scheduled: Vec<ScheduledTarget>,
    pub skipped: Vec<TargetName>,
}

/// Manages per-run state transitions for targets.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    targets: &'a mut HashMap<TargetName, TargetInfo>,
    current_run_id: Option<u64>,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a DagGraph,
        targets: &'a mut HashMap<TargetName, TargetInfo>,
        current_run_id: Option<u64>,
    ) -> Self {
        Self {
            graph,
            targets,
            current_run_id,
        }
    }

    /// Put targets into the run as `Pending`.
    ///
    /// `only = None` includes every target.
    pub fn mark_pending(&mut self, only: Option<&HashSet<TargetName>>) {
        for info in self.targets.values_mut() {
            let included = only.is_none_or(|set| set.contains(&info.name));
            if included {
                info.run_state = Some(RunState::Pending);
                debug!(target = %info.name, "marked Pending for this run");
            }
        }
    }

    /// Determine whether all dependencies of the given target are satisfied
    /// for the current run.
    pub fn deps_satisfied_for_info(&self, info: &TargetInfo) -> bool {
        let ro = ReadOnlyStateManager::new(self.targets);
        ro.deps_satisfied_for_info(info)
    }

    /// Cancel every pending descendant of a failed target.
    ///
    /// Returns the newly canceled targets (excluding the failed one).
    pub fn mark_descendants_canceled(&mut self, failed: &str) -> Vec<TargetName> {
        let mut stack: Vec<TargetName> = self.graph.dependents_of(failed).to_vec();
        let mut newly_canceled = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.targets.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) => {
                        info.run_state = Some(RunState::Canceled);
                        debug!(
                            target = %info.name,
                            upstream = %failed,
                            "canceling dependent due to upstream failure"
                        );
                        newly_canceled.push(info.name.clone());
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::Running) => {
                        // Cannot happen: a target only starts once every
                        // dependency produced a value.
                        warn!(target = %info.name, "dependent of failed target is running");
                    }
                    _ => {
                        // Terminal or not part of this run.
                    }
                }
            }
        }

        self.sort_by_order(&mut newly_canceled);
        newly_canceled
    }

    /// Cancel every target that has not started yet.
    pub fn cancel_all_pending(&mut self) -> Vec<TargetName> {
        let mut canceled: Vec<TargetName> = self
            .targets
            .values_mut()
            .filter(|info| info.run_state == Some(RunState::Pending))
            .map(|info| {
                info.run_state = Some(RunState::Canceled);
                info.name.clone()
            })
            .collect();
        self.sort_by_order(&mut canceled);
        canceled
    }

    /// Release pending targets whose dependencies are satisfied, in
    /// topological order.
    ///
    /// Up-to-date targets are marked `Skipped` on the spot (which may in
    /// turn release their dependents), unless a dependency now holds a
    /// different value than the one they were built from. Outdated ones are marked `Running`
    /// as long as fewer than `workers` targets are running.
    pub fn collect_new_ready_targets(&mut self, workers: usize) -> Released {
        let mut released = Released::default();

        loop {
            let mut candidates: Vec<(usize, TargetName)> = self
                .targets
                .values()
                .filter(|info| {
                    info.run_state == Some(RunState::Pending) && self.deps_satisfied_for_info(info)
                })
                .map(|info| (info.order, info.name.clone()))
                .collect();
            candidates.sort();

            let mut progressed = false;
            let mut running = self.running_count();

            for (_, name) in candidates {
                let changed_input = self.changed_input(&name);
                let Some(info) = self.targets.get_mut(&name) else {
                    continue;
                };

                if info.up_to_date {
                    if let Some(dep) = changed_input {
                        info!(
                            target = %info.name,
                            dependency = %dep,
                            "dependency value changed; target is outdated"
                        );
                        info.up_to_date = false;
                    }
                }

                if info.up_to_date {
                    info.run_state = Some(RunState::Skipped);
                    debug!(target = %info.name, run_id = self.current_run_id, "up to date; skipping");
                    released.skipped.push(info.name.clone());
                    progressed = true;
                    continue;
                }

                if running >= workers {
                    continue;
                }

                if info.last_built_run.is_some() || info.last_errored_run.is_some() {
                    info!(
                        target = %info.name,
                        run_id = self.current_run_id,
                        "scheduling target for re-run"
                    );
                } else {
                    info!(
                        target = %info.name,
                        run_id = self.current_run_id,
                        "scheduling target"
                    );
                }

                info.run_state = Some(RunState::Running);
                running += 1;
                released.scheduled.push(ScheduledTarget::from_target_info(
                    info,
                    self.current_run_id.unwrap_or(0),
                ));
            }

            // Only skips can unlock further targets within the same step.
            if !progressed {
                break;
            }
        }

        released
    }

    /// First dependency whose current value differs from the one `name`
    /// was last built from. Dependencies without a known hash on either
    /// side are not compared.
    fn changed_input(&self, name: &str) -> Option<TargetName> {
        let info = self.targets.get(name)?;
        info.recorded_inputs.iter().find_map(|(dep, recorded)| {
            let current = self.targets.get(dep)?.value_hash.as_ref()?;
            (current != recorded).then(|| dep.clone())
        })
    }

    pub fn running_count(&self) -> usize {
        self.targets
            .values()
            .filter(|info| info.run_state == Some(RunState::Running))
            .count()
    }

    /// Check if every target in the run is in a terminal state.
    pub fn all_targets_terminal(&self) -> bool {
        !self
            .targets
            .values()
            .any(|info| info.run_state.is_some_and(|s| !s.is_terminal()))
    }

    fn sort_by_order(&self, names: &mut [TargetName]) {
        names.sort_by_key(|n| self.targets.get(n).map(|i| i.order).unwrap_or(usize::MAX));
    }
}

/// A read-only view of the state manager for checking dependency satisfaction.
///
/// This is used when we only have shared access to the targets map (e.g. in
/// `Scheduler::deps_satisfied`).
pub struct ReadOnlyStateManager<'a> {
    targets: &'a HashMap<TargetName, TargetInfo>,
}

impl<'a> ReadOnlyStateManager<'a> {
    pub fn new(targets: &'a HashMap<TargetName, TargetInfo>) -> Self {
        Self { targets }
    }

    /// A dependency is satisfied once it was built or skipped in this run.
    /// Dependencies outside the run are satisfied if their stored result is
    /// up to date.
    pub fn deps_satisfied_for_info(&self, info: &TargetInfo) -> bool {
        for dep_name in &info.deps {
            let dep = match self.targets.get(dep_name) {
                Some(d) => d,
                None => {
                    warn!(
                        target = %info.name,
                        dep = %dep_name,
                        "dependency missing from targets map"
                    );
                    return false;
                }
            };

            match dep.run_state {
                Some(state) if state.provides_value() => {}
                Some(_) => return false,
                None => {
                    if !dep.up_to_date {
                        return false;
                    }
                }
            }
        }

        true
    }
}
