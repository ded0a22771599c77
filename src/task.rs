// src/task.rs

//! Task descriptors as handed to the engine.
//!
//! A [`Task`] is what the workflow-authoring side produces: a command, the
//! absolute paths it reads and writes, and a possibly incomplete
//! [`ResourceSpec`]. The resource validator turns each task into a
//! [`TaskNode`] carrying complete [`Resources`]; only nodes enter the graph.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Analysis name of a task. Not unique within a run.
pub type TaskName = String;

/// Position of a task in the submitted task list.
///
/// This is the identity the engine uses everywhere; analysis names may repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub usize);

impl TaskId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Task identity as reported to callers: list position plus analysis name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskRef {
    pub id: TaskId,
    pub name: TaskName,
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.id)
    }
}

/// Resource request as declared by config and/or the workflow.
///
/// Every field is optional here; missing or non-positive values are
/// rejected by [`crate::validate`], never defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ResourceSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,

    /// Memory in MB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,

    /// Wall-clock limit in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,

    /// Container image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,

    /// Extra arguments passed to the container runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_args: Option<String>,
}

impl ResourceSpec {
    /// Layer `over` on top of `self`; fields set in `over` win.
    pub fn overlay(&self, over: &ResourceSpec) -> ResourceSpec {
        ResourceSpec {
            cpus: over.cpus.or(self.cpus),
            memory: over.memory.or(self.memory),
            time: over.time.or(self.time),
            container: over.container.clone().or_else(|| self.container.clone()),
            extra_args: over.extra_args.clone().or_else(|| self.extra_args.clone()),
        }
    }
}

/// Complete, validated resource requirement of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resources {
    pub cpus: u32,
    pub memory_mb: u64,
    pub time_limit_minutes: u64,
    pub container: String,
    pub extra_args: String,
}

impl Resources {
    pub fn time_limit(&self) -> Duration {
        Duration::from_secs(self.time_limit_minutes.saturating_mul(60))
    }
}

/// One unit of work as produced by the authoring collaborator.
///
/// `inputs` / `outputs` must already be absolute; they are compared by exact
/// string equality when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub analysis_name: TaskName,
    pub command: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub resources: ResourceSpec,
}

impl Task {
    pub fn new(analysis_name: impl Into<TaskName>, command: impl Into<String>) -> Self {
        Self {
            analysis_name: analysis_name.into(),
            command: command.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            resources: ResourceSpec::default(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    pub fn with_outputs<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(outputs.into_iter().map(Into::into));
        self
    }

    pub fn with_resources(mut self, resources: ResourceSpec) -> Self {
        self.resources = resources;
        self
    }
}

/// A validated task with its identity assigned; the unit stored in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub id: TaskId,
    pub name: TaskName,
    pub command: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub resources: Resources,
}

impl TaskNode {
    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}
