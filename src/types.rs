// src/types.rs

use std::str::FromStr;
use serde::{Deserialize, Serialize};

/// What the scheduler does once a task has failed.
///
/// - `FailFast`: admit nothing new; every task that has not started yet is
///   skipped. Running tasks are allowed to finish (default).
/// - `Continue`: only the transitive dependents of the failed task are
///   skipped; independent branches keep running.
/// - `HardCancel`: like `FailFast`, but running tasks are terminated and
///   reported as cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    FailFast,
    Continue,
    HardCancel,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::FailFast
    }
}

impl FailurePolicy {
    /// Whether a failure stops admission of every not-yet-started task.
    pub fn halts_on_failure(self) -> bool {
        !matches!(self, FailurePolicy::Continue)
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            "hard-cancel" => Ok(FailurePolicy::HardCancel),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"fail-fast\", \"continue\" or \"hard-cancel\")"
            )),
        }
    }
}

/// Which isolation backend runs task commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobRunner {
    /// Plain `sh -c` on the host; the container reference is ignored.
    Local,
    /// `singularity exec <container> sh -c ...`
    Singularity,
    /// `docker run --rm <container> sh -c ...` with CPU/memory limits.
    Docker,
}

impl Default for JobRunner {
    fn default() -> Self {
        JobRunner::Local
    }
}

impl FromStr for JobRunner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(JobRunner::Local),
            "singularity" => Ok(JobRunner::Singularity),
            "docker" => Ok(JobRunner::Docker),
            other => Err(format!(
                "invalid job_runner: {other} (expected \"local\", \"singularity\" or \"docker\")"
            )),
        }
    }
}
