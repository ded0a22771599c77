// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::dag::budget::ResourceBudget;
use crate::dag::task_info::{ScheduledTask, TaskInfo, TaskState};
use crate::dag::DagGraph;
use crate::errors::Result;
use crate::task::TaskId;

/// Applies state transitions to the task table.
///
/// `tasks` is indexed by [`TaskId`]; the graph supplies the adjacency.
pub struct StateManager<'a> {
    graph: &'a DagGraph,
    tasks: &'a mut [TaskInfo],
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a DagGraph, tasks: &'a mut [TaskInfo]) -> Self {
        Self { graph, tasks }
    }

    /// Move `Pending` dependents of a succeeded task to `Ready` once every
    /// one of their dependencies has succeeded.
    pub fn promote_ready_dependents(&mut self, succeeded: TaskId) -> Vec<TaskId> {
        let mut promoted = Vec::new();

        for &dep_id in self.graph.dependents_of(succeeded) {
            let satisfied = match self.tasks.get(dep_id.index()) {
                Some(info) => info.state == TaskState::Pending && deps_satisfied(self.tasks, info),
                None => false,
            };

            if satisfied {
                if let Some(info) = self.tasks.get_mut(dep_id.index()) {
                    info.state = TaskState::Ready;
                    debug!(task = %info.name, id = %info.id, "dependencies satisfied; marking Ready");
                    promoted.push(info.id);
                }
            }
        }

        promoted
    }

    /// Skip every transitive dependent of `root` that has not started yet.
    ///
    /// Traversal continues through dependents that are already running or
    /// finished, so their own not-yet-started successors are skipped too.
    /// Returns the newly skipped tasks in ascending id order.
    pub fn skip_dependents(&mut self, root: TaskId) -> Vec<TaskId> {
        let mut stack: Vec<TaskId> = self.graph.dependents_of(root).to_vec();
        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut skipped = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }

            if let Some(info) = self.tasks.get_mut(id.index()) {
                if info.state.is_waiting() {
                    info.state = TaskState::Skipped;
                    debug!(
                        task = %info.name,
                        id = %info.id,
                        "marking dependent as Skipped due to upstream failure"
                    );
                    skipped.push(id);
                }
            }

            stack.extend(self.graph.dependents_of(id).iter().copied());
        }

        skipped.sort();
        skipped
    }

    /// Skip every task that has not started yet (fail-fast / shutdown).
    pub fn skip_all_waiting(&mut self) -> Vec<TaskId> {
        let mut skipped = Vec::new();

        for info in self.tasks.iter_mut() {
            if info.state.is_waiting() {
                info.state = TaskState::Skipped;
                debug!(task = %info.name, id = %info.id, "run halted; marking Skipped");
                skipped.push(info.id);
            }
        }

        skipped
    }

    /// Admit `Ready` tasks in ascending id order while they fit the budget.
    ///
    /// A task that does not fit is passed over; a later, smaller one may
    /// still start.
    pub fn admit_ready(&mut self, budget: &mut ResourceBudget) -> Result<Vec<ScheduledTask>> {
        let mut admitted = Vec::new();

        for info in self.tasks.iter_mut() {
            if info.state != TaskState::Ready || !budget.fits(&info.resources) {
                continue;
            }

            budget.acquire(&info.resources)?;
            info.state = TaskState::Running;

            info!(
                task = %info.name,
                id = %info.id,
                cpus = info.resources.cpus,
                memory_mb = info.resources.memory_mb,
                "admitting task"
            );

            admitted.push(ScheduledTask::from_task_info(info));
        }

        Ok(admitted)
    }

    pub fn running(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|info| info.state == TaskState::Running)
            .map(|info| info.id)
            .collect()
    }

    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.iter().all(|info| info.state.is_terminal())
    }
}

/// Whether every dependency of `info` has succeeded.
pub fn deps_satisfied(tasks: &[TaskInfo], info: &TaskInfo) -> bool {
    info.deps.iter().all(|dep| {
        tasks
            .get(dep.index())
            .is_some_and(|d| d.state == TaskState::Succeeded)
    })
}
