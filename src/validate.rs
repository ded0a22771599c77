// src/validate.rs

//! Resource validation, run before the graph is built.
//!
//! Every task must carry `cpus > 0`, `memory > 0`, `time > 0` and a
//! non-empty `container`. The first violation aborts validation; nothing is
//! executed for a workflow that fails here.

use tracing::debug;

use crate::dag::budget::BudgetLimits;
use crate::errors::{FlowError, ResourceField, Result};
use crate::task::{ResourceSpec, Resources, Task, TaskId, TaskNode};

/// Validate all tasks and assign their identities (list positions).
///
/// Also rejects tasks that could never be admitted under `limits`, since
/// such a task would otherwise wait forever.
pub fn validate_tasks(tasks: Vec<Task>, limits: &BudgetLimits) -> Result<Vec<TaskNode>> {
    let mut nodes = Vec::with_capacity(tasks.len());

    for (index, task) in tasks.into_iter().enumerate() {
        let resources = complete_resources(&task.analysis_name, &task.resources)?;
        ensure_within_budget(&task.analysis_name, &resources, limits)?;

        debug!(
            task = %task.analysis_name,
            id = index,
            cpus = resources.cpus,
            memory_mb = resources.memory_mb,
            time_limit_minutes = resources.time_limit_minutes,
            "resources validated"
        );

        nodes.push(TaskNode {
            id: TaskId(index),
            name: task.analysis_name,
            command: task.command,
            inputs: task.inputs,
            outputs: task.outputs,
            resources,
        });
    }

    Ok(nodes)
}

/// Turn a declared [`ResourceSpec`] into complete [`Resources`].
pub fn complete_resources(task: &str, spec: &ResourceSpec) -> Result<Resources> {
    let missing = |field| FlowError::MissingResourceSpec {
        task: task.to_string(),
        field,
    };

    let cpus = spec
        .cpus
        .filter(|c| *c > 0)
        .ok_or_else(|| missing(ResourceField::Cpus))?;
    let memory_mb = spec
        .memory
        .filter(|m| *m > 0)
        .ok_or_else(|| missing(ResourceField::Memory))?;
    let time_limit_minutes = spec
        .time
        .filter(|t| *t > 0)
        .ok_or_else(|| missing(ResourceField::Time))?;
    let container = spec
        .container
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| missing(ResourceField::Container))?
        .to_string();

    Ok(Resources {
        cpus,
        memory_mb,
        time_limit_minutes,
        container,
        extra_args: spec.extra_args.clone().unwrap_or_default(),
    })
}

fn ensure_within_budget(task: &str, resources: &Resources, limits: &BudgetLimits) -> Result<()> {
    if let Some(max) = limits.cpus {
        if u64::from(resources.cpus) > max {
            return Err(FlowError::ResourceExceedsBudget {
                task: task.to_string(),
                detail: format!("requires {} cpus but the budget is {max}", resources.cpus),
            });
        }
    }
    if let Some(max) = limits.memory {
        if resources.memory_mb > max {
            return Err(FlowError::ResourceExceedsBudget {
                task: task.to_string(),
                detail: format!(
                    "requires {} MB memory but the budget is {max} MB",
                    resources.memory_mb
                ),
            });
        }
    }
    Ok(())
}
