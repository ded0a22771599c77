// src/engine/core.rs

//! Synchronous decision layer of the engine.
//!
//! [`CoreRuntime`] turns each [`RuntimeEvent`] into a [`CoreStep`]: the
//! scheduler's state is updated and the step lists what the async shell
//! in [`super::runtime`] must do next (dispatch, cancel, exit). Nothing in
//! here awaits or touches a process, so whole runs can be driven by hand.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_shutdown, handle_start, handle_task_completion, CoreStep,
};
use crate::engine::{RunOutcome, RuntimeEvent};
use crate::errors::Result;

/// Owns the scheduler (and through it the task table and budget) for one run.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Whether every task reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Produce the initial dispatch.
    pub fn start(&mut self) -> Result<CoreStep> {
        handle_start(&mut self.scheduler)
    }

    /// Apply one event.
    ///
    /// An `Err` is an internal scheduling error and is fatal to the run.
    pub fn step(&mut self, event: RuntimeEvent) -> Result<CoreStep> {
        match event {
            RuntimeEvent::TaskCompleted { task, outcome } => {
                handle_task_completion(&mut self.scheduler, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => Ok(handle_shutdown(&mut self.scheduler)),
        }
    }

    pub fn outcome(&self) -> RunOutcome {
        self.scheduler.outcome()
    }
}
