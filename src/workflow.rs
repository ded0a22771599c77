// src/workflow.rs

//! Declarative workflow files.
//!
//! A workflow is plain data: an ordered list of tasks with their commands
//! and declared files.
//!
//! ```toml
//! [[task]]
//! analysis = "bwa"
//! command = "bwa mem ref.fa r1.fq > aln.sam"
//! inputs = ["r1.fq"]
//! outputs = ["aln.sam"]
//!
//! [task.resources]   # optional, layered over [resources.bwa] from config
//! cpus = 4
//! ```

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::FlowConfig;
use crate::errors::{FlowError, Result};
use crate::task::{ResourceSpec, Task};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowFile {
    #[serde(default)]
    pub task: Vec<WorkflowTask>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowTask {
    /// Analysis name; selects `[resources.<analysis>]` from config.
    pub analysis: String,
    pub command: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub resources: ResourceSpec,
}

/// Read a workflow file and turn it into engine tasks.
///
/// Relative input/output paths are made absolute against the current
/// working directory; resources are the config lookup for the analysis
/// with the task's inline `resources` layered on top.
pub fn load_workflow(path: impl AsRef<Path>, cfg: &FlowConfig) -> Result<Vec<Task>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        FlowError::WorkflowError(format!("cannot read workflow {}: {e}", path.display()))
    })?;

    let file: WorkflowFile = toml::from_str(&contents)?;
    let base = std::env::current_dir()?;

    let tasks = file
        .task
        .into_iter()
        .map(|t| into_task(t, &base, cfg))
        .collect::<Result<Vec<_>>>()?;

    debug!(path = %path.display(), tasks = tasks.len(), "workflow loaded");
    Ok(tasks)
}

fn into_task(raw: WorkflowTask, base: &Path, cfg: &FlowConfig) -> Result<Task> {
    if raw.analysis.trim().is_empty() {
        return Err(FlowError::WorkflowError(
            "every [[task]] needs a non-empty `analysis`".to_string(),
        ));
    }

    let resources = cfg.resources_for(&raw.analysis).overlay(&raw.resources);

    Ok(Task::new(raw.analysis, raw.command)
        .with_inputs(raw.inputs.iter().map(|p| absolutize(base, p)))
        .with_outputs(raw.outputs.iter().map(|p| absolutize(base, p)))
        .with_resources(resources))
}

/// Join a relative path onto `base` and clean `.` / `..` components.
///
/// Purely lexical: no symlink resolution, no existence check.
pub fn absolutize(base: &Path, path: &str) -> String {
    let joined = base.join(path);

    let mut clean = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                clean.pop();
            }
            other => clean.push(other.as_os_str()),
        }
    }

    clean.to_string_lossy().into_owned()
}
