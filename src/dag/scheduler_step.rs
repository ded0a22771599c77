// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task_info::ScheduledTask;
use crate::task::TaskId;

/// Structured result of a single scheduler "step".
///
/// This is useful for tests that want to manually step the DAG and make
/// assertions about what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks admitted to `Running` by this step; dispatch them now.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks moved to `Skipped` by this step.
    pub newly_skipped: Vec<TaskId>,
    /// Whether every task is terminal after this step.
    pub run_finished: bool,
}
