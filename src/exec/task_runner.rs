// src/exec/task_runner.rs

//! Individual task process runner.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{ExecutionReport, FailureReason, RuntimeEvent, TaskOutcome};
use crate::exec::command::{build_launch, sanitize, teardown_command, ExecSettings};

/// Number of trailing lines kept per stream for the report summaries.
pub const SUMMARY_LINES: usize = 20;

/// How long to wait for output pumps after the child is gone.
const PUMP_GRACE: Duration = Duration::from_secs(2);

/// Run a single task and report its outcome to the runtime.
///
/// The process (and its container, if any) is gone before the
/// `TaskCompleted` event is sent.
pub async fn run_task(
    task: ScheduledTask,
    settings: &ExecSettings,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let id = task.id;
    let outcome = execute_with_limit(&task, settings, task.resources.time_limit(), cancel_rx).await;

    if let Err(e) = runtime_tx
        .send(RuntimeEvent::TaskCompleted { task: id, outcome })
        .await
    {
        error!(
            task = %task.name,
            id = %id,
            error = %e,
            "failed to send TaskCompleted event to runtime"
        );
    }
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Execute `task` with an explicit wall-clock `limit`.
///
/// - Exit status 0 → `Succeeded`.
/// - Non-zero exit → `Failed(NonZeroExit)`.
/// - Limit reached → process killed, `Failed(TimeLimitExceeded)`.
/// - Cancel signal (or its sender dropped) → process killed, `Cancelled`.
/// - Spawn / wait errors → `Failed(Runtime)`.
pub async fn execute_with_limit(
    task: &ScheduledTask,
    settings: &ExecSettings,
    limit: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) -> TaskOutcome {
    let started = Instant::now();

    info!(
        task = %task.name,
        id = %task.id,
        cmd = %task.command,
        runner = ?settings.job_runner,
        "starting task process"
    );

    let launch = build_launch(task, settings);
    let container_name = launch.container_name;
    let mut command = launch.command;

    let mut child = match command
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.name))
    {
        Ok(child) => child,
        Err(err) => {
            error!(task = %task.name, id = %task.id, error = %err, "task execution error");
            return TaskOutcome::Failed {
                reason: FailureReason::Runtime(format!("{err:#}")),
                report: ExecutionReport {
                    duration_ms: elapsed_ms(started),
                    ..ExecutionReport::default()
                },
            };
        }
    };

    let stdout_pump = child
        .stdout
        .take()
        .map(|s| tokio::spawn(pump_stream(s, log_path(settings, task, "stdout"))));
    let stderr_pump = child
        .stderr
        .take()
        .map(|s| tokio::spawn(pump_stream(s, log_path(settings, task, "stderr"))));

    let ending = tokio::select! {
        res = tokio::time::timeout(limit, child.wait()) => match res {
            Ok(status) => Ending::Exited(status),
            Err(_) => Ending::TimedOut,
        },
        _ = &mut cancel_rx => Ending::Cancelled,
    };

    if !matches!(ending, Ending::Exited(Ok(_))) {
        if let Err(e) = kill_process_tree(&mut child).await {
            warn!(task = %task.name, id = %task.id, error = %e, "failed to kill task process");
        }
        if let Some(name) = container_name.as_deref() {
            match teardown_command(settings, name).status().await {
                Ok(status) => debug!(container = %name, %status, "container removed"),
                Err(e) => warn!(container = %name, error = %e, "failed to remove container"),
            }
        }
    }

    let report = ExecutionReport {
        exit_code: match &ending {
            Ending::Exited(Ok(status)) => status.code(),
            _ => None,
        },
        stdout_summary: finish_pump(stdout_pump).await,
        stderr_summary: finish_pump(stderr_pump).await,
        duration_ms: elapsed_ms(started),
    };

    let outcome = match ending {
        Ending::Exited(Ok(status)) if status.success() => TaskOutcome::Succeeded(report),
        Ending::Exited(Ok(status)) => {
            let reason = match status.code() {
                Some(code) => FailureReason::NonZeroExit(code),
                None => FailureReason::Runtime(format!("process terminated abnormally: {status}")),
            };
            TaskOutcome::Failed { reason, report }
        }
        Ending::Exited(Err(e)) => TaskOutcome::Failed {
            reason: FailureReason::Runtime(format!(
                "waiting for process of task '{}': {e}",
                task.name
            )),
            report,
        },
        Ending::TimedOut => {
            warn!(
                task = %task.name,
                id = %task.id,
                limit_minutes = task.resources.time_limit_minutes,
                "task exceeded its time limit; process killed"
            );
            TaskOutcome::Failed {
                reason: FailureReason::TimeLimitExceeded {
                    limit_minutes: task.resources.time_limit_minutes,
                },
                report,
            }
        }
        Ending::Cancelled => {
            info!(task = %task.name, id = %task.id, "task cancelled; process killed");
            TaskOutcome::Cancelled
        }
    };

    info!(
        task = %task.name,
        id = %task.id,
        success = outcome.is_success(),
        "task process finished"
    );

    outcome
}

/// Signal the task's whole process group, then reap the direct child.
///
/// Tasks are spawned as group leaders, so the group id is the child's pid.
/// Anything the command started in the background goes down with it.
#[cfg(unix)]
async fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    if let Some(id) = child.id() {
        if let Err(errno) = killpg(Pid::from_raw(id as i32), Signal::SIGKILL) {
            debug!(pgid = id, error = %errno, "signalling process group failed");
        }
    }
    child.kill().await
}

#[cfg(not(unix))]
async fn kill_process_tree(child: &mut Child) -> std::io::Result<()> {
    child.kill().await
}

/// Drain a stream to its end, appending the raw bytes to `log_path` if
/// given, and return the last [`SUMMARY_LINES`] lines.
///
/// Lines are split on `\n` and decoded lossily for the summary. The stream
/// is always read to EOF so the writer never sees a closed pipe.
async fn pump_stream<R>(stream: R, log_path: Option<PathBuf>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut log = match log_path {
        Some(path) => match File::create(&path).await {
            Ok(f) => Some(f),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot create task log file");
                None
            }
        },
        None => None,
    };

    let mut tail: VecDeque<String> = VecDeque::with_capacity(SUMMARY_LINES);
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "reading task output failed");
                break;
            }
        }

        if let Some(f) = log.as_mut() {
            if let Err(e) = f.write_all(&buf).await {
                warn!(error = %e, "writing task log failed; further output is not logged");
                log = None;
            }
        }

        let line = buf.strip_suffix(b"\n").unwrap_or(&buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if tail.len() == SUMMARY_LINES {
            tail.pop_front();
        }
        tail.push_back(String::from_utf8_lossy(line).into_owned());
    }

    if let Some(mut f) = log {
        let _ = f.flush().await;
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

async fn finish_pump(pump: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = pump else {
        return String::new();
    };

    // A grandchild may still hold the pipe open after the child is gone.
    match tokio::time::timeout(PUMP_GRACE, &mut handle).await {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            debug!(error = %e, "output pump task failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

fn log_path(settings: &ExecSettings, task: &ScheduledTask, stream: &str) -> Option<PathBuf> {
    settings.log_dir.as_ref().map(|dir| {
        dir.join(format!(
            "{}-{}.{stream}",
            task.id.index(),
            sanitize(&task.name)
        ))
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
