// src/dag/scheduler.rs

use tracing::{debug, info, warn};

use crate::dag::budget::{BudgetLimits, ResourceBudget};
use crate::dag::graph::DagGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{deps_satisfied, StateManager};
use crate::dag::task_info::{ScheduledTask, TaskInfo, TaskState};
use crate::engine::{RunOutcome, TaskFailure, TaskOutcome};
use crate::errors::{FlowError, Result};
use crate::task::TaskId;
use crate::types::FailurePolicy;

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - deciding when a task is ready (all dependencies succeeded)
/// - admitting ready tasks within the global CPU / memory budget
/// - recording executor outcomes
/// - skipping dependents (or everything not started) when a task fails
///
/// All transitions go through this type; it is owned by a single
/// coordination point and never shared.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    tasks: Vec<TaskInfo>,
    budget: ResourceBudget,
    policy: FailurePolicy,
    started: bool,
    /// No further tasks will be admitted.
    halted: bool,
    interrupted: bool,
    failures: Vec<TaskFailure>,
}

impl Scheduler {
    pub fn new(graph: DagGraph, limits: BudgetLimits, policy: FailurePolicy) -> Self {
        let tasks = graph
            .tasks()
            .map(|node| TaskInfo::from_node(node, graph.dependencies_of(node.id).to_vec()))
            .collect();

        Self {
            graph,
            tasks,
            budget: ResourceBudget::new(limits),
            policy,
            started: false,
            halted: false,
            interrupted: false,
            failures: Vec::new(),
        }
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn state_of(&self, id: TaskId) -> Option<TaskState> {
        self.tasks.get(id.index()).map(|info| info.state)
    }

    /// Whether all dependencies of `id` have succeeded. `None` for unknown ids.
    pub fn deps_satisfied(&self, id: TaskId) -> Option<bool> {
        let info = self.tasks.get(id.index())?;
        Some(deps_satisfied(&self.tasks, info))
    }

    pub fn running_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .iter()
            .filter(|info| info.state == TaskState::Running)
            .map(|info| info.id)
            .collect()
    }

    /// Every task has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|info| info.state.is_terminal())
    }

    /// Admit the initial set of ready tasks (production API).
    pub fn start(&mut self) -> Result<Vec<ScheduledTask>> {
        Ok(self.step_start()?.newly_scheduled)
    }

    /// Record an executor outcome (production API).
    pub fn handle_completion(
        &mut self,
        id: TaskId,
        outcome: TaskOutcome,
    ) -> Result<Vec<ScheduledTask>> {
        Ok(self.step_completion(id, outcome)?.newly_scheduled)
    }

    /// Manual-step variant of `start` that returns a rich [`SchedulerStep`].
    pub fn step_start(&mut self) -> Result<SchedulerStep> {
        if self.started {
            return Err(FlowError::InternalScheduling(
                "scheduler started twice".to_string(),
            ));
        }
        self.started = true;

        info!(
            tasks = self.tasks.len(),
            edges = self.graph.edge_count(),
            policy = ?self.policy,
            budget = ?self.budget.limits(),
            "scheduler: starting run"
        );

        let newly_scheduled = self.admit()?;
        Ok(SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            run_finished: self.is_finished(),
        })
    }

    /// Manual-step variant of `handle_completion` that returns a rich [`SchedulerStep`].
    pub fn step_completion(&mut self, id: TaskId, outcome: TaskOutcome) -> Result<SchedulerStep> {
        let info = self.tasks.get_mut(id.index()).ok_or_else(|| {
            FlowError::InternalScheduling(format!("completion reported for unknown task {id}"))
        })?;

        if info.state != TaskState::Running {
            return Err(FlowError::InternalScheduling(format!(
                "completion reported for task {} in state {:?}",
                info.task_ref(),
                info.state
            )));
        }

        self.budget.release(&info.resources)?;

        let mut newly_skipped = Vec::new();

        match outcome {
            TaskOutcome::Succeeded(report) => {
                info.state = TaskState::Succeeded;
                debug!(
                    task = %info.name,
                    id = %id,
                    duration_ms = report.duration_ms,
                    "task completed successfully"
                );
                let mut manager = StateManager::new(&self.graph, &mut self.tasks);
                manager.promote_ready_dependents(id);
            }
            TaskOutcome::Failed { reason, report } => {
                info.state = TaskState::Failed;
                warn!(
                    task = %info.name,
                    id = %id,
                    exit_code = ?report.exit_code,
                    reason = %reason,
                    "task failed; skipping dependents"
                );
                self.failures.push(TaskFailure {
                    task: info.task_ref(),
                    reason,
                    report,
                });

                let mut manager = StateManager::new(&self.graph, &mut self.tasks);
                newly_skipped = manager.skip_dependents(id);
                if self.policy.halts_on_failure() {
                    newly_skipped.extend(manager.skip_all_waiting());
                    if !self.halted {
                        info!(policy = ?self.policy, "scheduler: halting admissions after failure");
                    }
                    self.halted = true;
                }
            }
            TaskOutcome::Cancelled => {
                info.state = TaskState::Cancelled;
                info!(task = %info.name, id = %id, "task cancelled");
                let mut manager = StateManager::new(&self.graph, &mut self.tasks);
                newly_skipped = manager.skip_dependents(id);
            }
        }

        let newly_scheduled = self.admit()?;

        Ok(SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_finished: self.is_finished(),
        })
    }

    /// Stop admitting work: every not-yet-started task is skipped.
    ///
    /// Running tasks are untouched; the caller decides whether to cancel
    /// them (see [`Scheduler::running_tasks`]).
    pub fn halt(&mut self, interrupted: bool) -> SchedulerStep {
        self.halted = true;
        self.interrupted |= interrupted;

        let mut manager = StateManager::new(&self.graph, &mut self.tasks);
        let newly_skipped = manager.skip_all_waiting();

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_skipped,
            run_finished: self.is_finished(),
        }
    }

    /// Aggregate the current task states into a [`RunOutcome`].
    pub fn outcome(&self) -> RunOutcome {
        let mut outcome = RunOutcome {
            failed: self.failures.clone(),
            interrupted: self.interrupted,
            ..RunOutcome::default()
        };

        for info in &self.tasks {
            match info.state {
                TaskState::Succeeded => outcome.succeeded.push(info.task_ref()),
                TaskState::Skipped => outcome.skipped.push(info.task_ref()),
                TaskState::Cancelled => outcome.cancelled.push(info.task_ref()),
                TaskState::Failed
                | TaskState::Pending
                | TaskState::Ready
                | TaskState::Running => {}
            }
        }

        outcome
    }

    /// Admit whatever fits, unless halted, and check that the run can
    /// still make progress.
    fn admit(&mut self) -> Result<Vec<ScheduledTask>> {
        if self.halted {
            return Ok(Vec::new());
        }

        let mut manager = StateManager::new(&self.graph, &mut self.tasks);
        let admitted = manager.admit_ready(&mut self.budget)?;

        let stalled = !manager.all_tasks_terminal() && manager.running().is_empty();
        if stalled {
            return Err(FlowError::InternalScheduling(
                "no task is running but the run has unfinished tasks".to_string(),
            ));
        }

        Ok(admitted)
    }
}
