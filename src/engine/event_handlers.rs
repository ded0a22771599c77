// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{info, warn};

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::TaskOutcome;
use crate::errors::Result;
use crate::task::TaskId;
use crate::types::FailurePolicy;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Terminate these running tasks; each will report `Cancelled`.
    CancelTasks(Vec<TaskId>),
    /// Every task is terminal; the shell should stop.
    RequestExit,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Seed the run: dispatch everything that is ready and fits the budget.
pub fn handle_start(scheduler: &mut Scheduler) -> Result<CoreStep> {
    let mut commands = Vec::new();

    let newly_ready = scheduler.start()?;
    if !newly_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(newly_ready));
    }

    Ok(finish_if_done(scheduler, commands))
}

/// Handle a task completion event.
///
/// Under [`FailurePolicy::HardCancel`] a failure also cancels everything
/// still running.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskId,
    outcome: TaskOutcome,
) -> Result<CoreStep> {
    let mut commands = Vec::new();
    let failed = matches!(outcome, TaskOutcome::Failed { .. });

    let step = scheduler.step_completion(task, outcome)?;
    if !step.newly_scheduled.is_empty() {
        commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
    }

    if failed && scheduler.policy() == FailurePolicy::HardCancel {
        let running = scheduler.running_tasks();
        if !running.is_empty() {
            warn!(?running, "hard-cancel policy: cancelling running tasks after failure");
            commands.push(CoreCommand::CancelTasks(running));
        }
    }

    Ok(finish_if_done(scheduler, commands))
}

/// Handle a shutdown request: skip everything not started, cancel the rest.
pub fn handle_shutdown(scheduler: &mut Scheduler) -> CoreStep {
    let mut commands = Vec::new();

    let step = scheduler.halt(true);
    info!(
        skipped = step.newly_skipped.len(),
        "shutdown requested; no further tasks will start"
    );

    let running = scheduler.running_tasks();
    if !running.is_empty() {
        commands.push(CoreCommand::CancelTasks(running));
    }

    finish_if_done(scheduler, commands)
}

fn finish_if_done(scheduler: &Scheduler, mut commands: Vec<CoreCommand>) -> CoreStep {
    let mut keep_running = true;
    if scheduler.is_finished() {
        keep_running = false;
        commands.push(CoreCommand::RequestExit);
    }

    CoreStep {
        commands,
        keep_running,
    }
}
