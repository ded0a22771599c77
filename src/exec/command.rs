// src/exec/command.rs

//! Building the process invocation for a task under the configured job runner.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::FlowConfig;
use crate::dag::ScheduledTask;
use crate::types::JobRunner;

/// Executor settings derived from the resolved configuration.
#[derive(Debug, Clone)]
pub struct ExecSettings {
    pub job_runner: JobRunner,
    pub singularity_bin: String,
    pub docker_bin: String,
    /// Directory for full per-task stdout/stderr logs; `None` keeps only
    /// the in-memory summaries.
    pub log_dir: Option<PathBuf>,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            job_runner: JobRunner::Local,
            singularity_bin: "singularity".to_string(),
            docker_bin: "docker".to_string(),
            log_dir: None,
        }
    }
}

impl ExecSettings {
    pub fn from_config(cfg: &FlowConfig) -> Self {
        Self {
            job_runner: cfg.config.job_runner,
            singularity_bin: cfg.config.singularity_bin.clone(),
            docker_bin: cfg.config.docker_bin.clone(),
            log_dir: Some(cfg.log_dir()),
        }
    }
}

/// A ready-to-spawn command plus what is needed to tear it down.
#[derive(Debug)]
pub struct Launch {
    pub command: Command,
    /// Name of the docker container, removed forcibly on abnormal exit.
    pub container_name: Option<String>,
}

/// Build the command line for `task`.
///
/// - `local`: `sh -c <command>` (`cmd /C` on Windows)
/// - `singularity`: `<bin> exec <extra args> <container> sh -c <command>`
/// - `docker`: `<bin> run --rm --name <name> --cpus N --memory Nm <extra args>
///   <container> sh -c <command>`
pub fn build_launch(task: &ScheduledTask, settings: &ExecSettings) -> Launch {
    let extra_args = task.resources.extra_args.split_whitespace();

    let (mut command, container_name) = match settings.job_runner {
        JobRunner::Local => (shell_command(&task.command), None),
        JobRunner::Singularity => {
            let mut c = Command::new(&settings.singularity_bin);
            c.arg("exec")
                .args(extra_args)
                .arg(&task.resources.container)
                .arg("sh")
                .arg("-c")
                .arg(&task.command);
            (c, None)
        }
        JobRunner::Docker => {
            let name = container_name_for(task);
            let mut c = Command::new(&settings.docker_bin);
            c.arg("run")
                .arg("--rm")
                .arg("--name")
                .arg(&name)
                .arg("--cpus")
                .arg(task.resources.cpus.to_string())
                .arg("--memory")
                .arg(format!("{}m", task.resources.memory_mb))
                .args(extra_args)
                .arg(&task.resources.container)
                .arg("sh")
                .arg("-c")
                .arg(&task.command);
            (c, Some(name))
        }
    };

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so the task's descendants can be signalled together.
    #[cfg(unix)]
    command.process_group(0);

    Launch {
        command,
        container_name,
    }
}

/// Command that forcibly removes a named docker container.
pub fn teardown_command(settings: &ExecSettings, container_name: &str) -> Command {
    let mut c = Command::new(&settings.docker_bin);
    c.arg("rm")
        .arg("-f")
        .arg(container_name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    c
}

fn shell_command(script: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(script);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(script);
        c
    }
}

fn container_name_for(task: &ScheduledTask) -> String {
    format!(
        "flow-{}-{}-{}",
        std::process::id(),
        task.id.index(),
        sanitize(&task.name)
    )
}

/// Restrict a task name to characters safe in file and container names.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
