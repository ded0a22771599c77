// src/lib.rs

pub mod cli;
pub mod config;
pub mod controller;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod task;
pub mod types;
pub mod validate;
pub mod workflow;

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{load_config, parse_override, FlowConfig};
use crate::controller::{plan, Queue, RunOptions};
use crate::task::Task;
use crate::workflow::load_workflow;

pub use crate::controller::run_tasks;
pub use crate::engine::RunOutcome;
pub use crate::errors::FlowError;
pub use crate::task::{ResourceSpec, TaskId, TaskRef};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (defaults, files, environment, `--set`)
/// - workflow loading
/// - validation + graph construction
/// - scheduler / runtime / executor
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let overrides = args
        .set
        .iter()
        .map(|s| parse_override(s))
        .collect::<errors::Result<Vec<_>>>()?;

    let mut cfg = load_config(args.config.as_deref(), &overrides)?;
    if let Some(policy) = args.failure_policy {
        cfg.config.failure_policy = policy;
    }

    if let Some(path) = args.write_config.as_deref() {
        cfg.write_config_as(path)?;
        println!("configuration written to {}", path.display());
        return Ok(());
    }

    let workflow = args
        .workflow
        .as_deref()
        .context("a workflow file is required")?;
    let tasks = load_workflow(workflow, &cfg)?;

    if args.dry_run {
        print_dry_run(&cfg, tasks)?;
        return Ok(());
    }

    let options = RunOptions {
        handle_ctrl_c: true,
        ..RunOptions::from_config(&cfg)
    };

    let queue: Queue = tasks.into_iter().collect();
    let outcome = queue.run_with_options(&cfg, options).await?;

    println!("{outcome}");
    if !outcome.is_success() {
        bail!("workflow did not complete successfully");
    }
    Ok(())
}

/// Dry-run output: validated tasks, inferred edges and an execution order.
fn print_dry_run(cfg: &FlowConfig, tasks: Vec<Task>) -> Result<()> {
    println!("flow dry-run");
    println!("  config.job_runner = {:?}", cfg.config.job_runner);
    println!("  config.failure_policy = {:?}", cfg.config.failure_policy);
    println!(
        "  budget = cpus: {}, memory: {}",
        cfg.budget
            .cpus
            .map_or_else(|| "unlimited".to_string(), |c| c.to_string()),
        cfg.budget
            .memory
            .map_or_else(|| "unlimited".to_string(), |m| format!("{m} MB"))
    );
    println!();

    let graph = plan(tasks, &cfg.budget)?;

    println!("tasks ({}):", graph.len());
    for task in graph.tasks() {
        println!("  - {}", task.task_ref());
        println!("      cmd: {}", task.command);
        println!(
            "      resources: {} cpus, {} MB, {} min, {}",
            task.resources.cpus,
            task.resources.memory_mb,
            task.resources.time_limit_minutes,
            task.resources.container
        );
        if !task.inputs.is_empty() {
            println!("      inputs: {:?}", task.inputs);
        }
        if !task.outputs.is_empty() {
            println!("      outputs: {:?}", task.outputs);
        }
        let deps = graph.dependencies_of(task.id);
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }
    }

    println!();
    println!("edges ({}):", graph.edge_count());
    for (from, to) in graph.edges() {
        println!("  {from} -> {to}");
    }

    println!();
    let order: Vec<String> = graph
        .topological_order()
        .iter()
        .filter_map(|id| graph.task(*id))
        .map(|t| t.task_ref().to_string())
        .collect();
    println!("order: {}", order.join(" -> "));

    debug!("dry-run complete (no execution)");
    Ok(())
}
