// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::FailurePolicy;

/// Command-line arguments for `flow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "flow",
    version,
    about = "Run a workflow of containerised tasks in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Workflow file (TOML) listing the tasks to run.
    #[arg(value_name = "WORKFLOW", required_unless_present = "write_config")]
    pub workflow: Option<PathBuf>,

    /// Local config file (TOML), layered over `~/.config/flow/flow.toml`.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override a config value, e.g. `--set budget.cpus=8`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// What to do when a task fails (fail-fast, continue, hard-cancel).
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate, build the graph and print the plan without executing.
    #[arg(long)]
    pub dry_run: bool,

    /// Write the resolved configuration to PATH and exit.
    ///
    /// Fails if PATH already exists.
    #[arg(long, value_name = "PATH")]
    pub write_config: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
