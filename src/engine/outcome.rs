// src/engine/outcome.rs

//! Aggregate result of a workflow run.

use std::fmt;

use crate::engine::{ExecutionReport, FailureReason};
use crate::task::TaskRef;

/// One failed task with its diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: TaskRef,
    pub reason: FailureReason,
    pub report: ExecutionReport,
}

/// What happened to every task of a run.
///
/// Each task appears in exactly one of `succeeded`, `failed`, `skipped`
/// or `cancelled`. `failed` is in the order the failures were reported, so
/// `failed[0]` is the failure that triggered any fail-fast halt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    pub succeeded: Vec<TaskRef>,
    pub failed: Vec<TaskFailure>,
    pub skipped: Vec<TaskRef>,
    pub cancelled: Vec<TaskRef>,
    /// The run was stopped by a shutdown request rather than finishing.
    pub interrupted: bool,
}

impl RunOutcome {
    /// Outcome of a run with no tasks.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True iff every task succeeded.
    ///
    /// Outside of a shutdown, tasks are only skipped or cancelled as a
    /// consequence of a failure, so this is the same as "no task failed".
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && self.cancelled.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len() + self.cancelled.len()
    }

    pub fn first_failure(&self) -> Option<&TaskFailure> {
        self.failed.first()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.task.name.as_str()).collect()
    }

    pub fn skipped_names(&self) -> Vec<&str> {
        self.skipped.iter().map(|t| t.name.as_str()).collect()
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            return write!(f, "workflow succeeded ({} tasks)", self.succeeded.len());
        }

        write!(
            f,
            "workflow {}: {} succeeded, {} failed, {} skipped, {} cancelled",
            if self.interrupted { "interrupted" } else { "failed" },
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len(),
            self.cancelled.len()
        )?;
        for failure in &self.failed {
            write!(f, "\n  failed:    {} ({})", failure.task, failure.reason)?;
            if !failure.report.stderr_summary.is_empty() {
                for line in failure.report.stderr_summary.lines() {
                    write!(f, "\n             | {line}")?;
                }
            }
        }
        for task in &self.skipped {
            write!(f, "\n  skipped:   {task}")?;
        }
        for task in &self.cancelled {
            write!(f, "\n  cancelled: {task}")?;
        }
        Ok(())
    }
}
