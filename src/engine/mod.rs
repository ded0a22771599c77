// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the DAG scheduler
//! - the main runtime event loop that reacts to:
//!   - task completion events from the executor
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`]. The aggregated result of a run is
//! [`RunOutcome`].

use std::fmt;

use crate::task::TaskId;

/// Exit diagnostics captured by the executor for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    /// `None` if the process never exited on its own (killed, failed to spawn).
    pub exit_code: Option<i32>,
    /// Last lines of stdout.
    pub stdout_summary: String,
    /// Last lines of stderr.
    pub stderr_summary: String,
    pub duration_ms: u64,
}

/// Why a task ended up `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The command exited with a non-zero status.
    NonZeroExit(i32),
    /// The task ran past its declared time limit and was terminated.
    TimeLimitExceeded { limit_minutes: u64 },
    /// The task could not be run at all (spawn error, signal, IO error).
    Runtime(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NonZeroExit(code) => write!(f, "exited with status {code}"),
            FailureReason::TimeLimitExceeded { limit_minutes } => {
                write!(f, "time limit of {limit_minutes} minute(s) exceeded")
            }
            FailureReason::Runtime(msg) => write!(f, "execution error: {msg}"),
        }
    }
}

/// Outcome of one task execution as reported by the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded(ExecutionReport),
    Failed {
        reason: FailureReason,
        report: ExecutionReport,
    },
    /// Terminated on request (hard cancel / shutdown) before finishing.
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded(_))
    }
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task finished; its resources have already been released.
    TaskCompleted { task: TaskId, outcome: TaskOutcome },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod core;
pub mod event_handlers;
pub mod outcome;
pub mod runtime;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use outcome::{RunOutcome, TaskFailure};
pub use runtime::Runtime;
