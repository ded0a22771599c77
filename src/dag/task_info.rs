// src/dag/task_info.rs

//! Per-task runtime state and the description handed to executors.

use crate::task::{Resources, TaskId, TaskName, TaskNode, TaskRef};

/// Runtime status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting on at least one dependency.
    Pending,
    /// All dependencies succeeded; waiting for budget.
    Ready,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    Failed,
    /// Never started because a dependency failed or the run was halted.
    Skipped,
    /// Terminated while running (hard cancel or shutdown).
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped | TaskState::Cancelled
        )
    }

    /// Not started and not yet terminal.
    pub fn is_waiting(self) -> bool {
        matches!(self, TaskState::Pending | TaskState::Ready)
    }
}

/// Static task information from the graph, plus the mutable run state.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub id: TaskId,
    pub name: TaskName,
    pub command: String,
    pub resources: Resources,
    /// Direct dependencies (producers of this task's inputs).
    pub deps: Vec<TaskId>,
    pub state: TaskState,
}

impl TaskInfo {
    pub fn from_node(node: &TaskNode, deps: Vec<TaskId>) -> Self {
        let state = if deps.is_empty() {
            TaskState::Ready
        } else {
            TaskState::Pending
        };

        Self {
            id: node.id,
            name: node.name.clone(),
            command: node.command.clone(),
            resources: node.resources.clone(),
            deps,
            state,
        }
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub name: TaskName,
    pub command: String,
    pub resources: Resources,
}

impl ScheduledTask {
    pub fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            id: info.id,
            name: info.name.clone(),
            command: info.command.clone(),
            resources: info.resources.clone(),
        }
    }
}
