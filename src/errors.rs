// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Structural problems (bad resources, ambiguous producers, cycles) are
//! reported here and abort a run before any task starts. Per-task runtime
//! failures are *not* errors: they are recorded in the
//! [`RunOutcome`](crate::engine::RunOutcome).

use std::fmt;

use thiserror::Error;

/// Resource field that a task must declare with a positive / non-empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Cpus,
    Memory,
    Time,
    Container,
}

impl fmt::Display for ResourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceField::Cpus => "cpus",
            ResourceField::Memory => "memory",
            ResourceField::Time => "time",
            ResourceField::Container => "container",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("no {field} resource for task '{task}'")]
    MissingResourceSpec { task: String, field: ResourceField },

    #[error("task '{task}' can never be admitted: {detail}")]
    ResourceExceedsBudget { task: String, detail: String },

    #[error("output path '{path}' is declared by both '{first}' and '{second}'")]
    AmbiguousProducer {
        path: String,
        first: String,
        second: String,
    },

    #[error("cycle detected in task graph involving: {}", tasks.join(", "))]
    CyclicDependency { tasks: Vec<String> },

    #[error("internal scheduling error: {0}")]
    InternalScheduling(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Workflow error: {0}")]
    WorkflowError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlowError {
    /// Whether this error was detected before any task was executed.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            FlowError::MissingResourceSpec { .. }
                | FlowError::ResourceExceedsBudget { .. }
                | FlowError::AmbiguousProducer { .. }
                | FlowError::CyclicDependency { .. }
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, FlowError>;
