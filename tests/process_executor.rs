// tests/process_executor.rs
//
// Runs real `sh -c` processes through the local job runner.

#![cfg(unix)]

use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use flow::controller::{run_tasks, RunOptions};
use flow::dag::{BudgetLimits, ScheduledTask};
use flow::engine::{FailureReason, TaskOutcome};
use flow::exec::task_runner::execute_with_limit;
use flow::exec::{ExecSettings, RealExecutorBackend};
use flow::task::{Resources, TaskId};
use flow::types::FailurePolicy;
use flow_test_utils::builders::TaskBuilder;
use flow_test_utils::{init_tracing, with_timeout};

fn scheduled(name: &str, command: &str) -> ScheduledTask {
    ScheduledTask {
        id: TaskId(0),
        name: name.to_string(),
        command: command.to_string(),
        resources: Resources {
            cpus: 1,
            memory_mb: 100,
            time_limit_minutes: 1,
            container: "docker://alpine:3".to_string(),
            extra_args: String::new(),
        },
    }
}

async fn run_with_limit(task: &ScheduledTask, limit: Duration) -> TaskOutcome {
    let (_cancel_tx, cancel_rx) = oneshot::channel::<()>();
    execute_with_limit(task, &ExecSettings::default(), limit, cancel_rx).await
}

#[tokio::test]
async fn successful_command_reports_exit_code_and_output_tail() {
    init_tracing();

    let task = scheduled("hello", "echo one; echo two; echo oops >&2");
    let outcome = with_timeout(run_with_limit(&task, Duration::from_secs(10))).await;

    match outcome {
        TaskOutcome::Succeeded(report) => {
            assert_eq!(report.exit_code, Some(0));
            assert_eq!(report.stdout_summary, "one\ntwo");
            assert_eq!(report.stderr_summary, "oops");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn non_zero_exit_is_a_failure_with_the_code() {
    init_tracing();

    let task = scheduled("bad", "echo broken >&2; exit 3");
    let outcome = with_timeout(run_with_limit(&task, Duration::from_secs(10))).await;

    match outcome {
        TaskOutcome::Failed { reason, report } => {
            assert_eq!(reason, FailureReason::NonZeroExit(3));
            assert_eq!(report.exit_code, Some(3));
            assert_eq!(report.stderr_summary, "broken");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn output_summary_keeps_only_the_last_lines() {
    init_tracing();

    let task = scheduled("chatty", "for i in $(seq 1 50); do echo line$i; done");
    let outcome = with_timeout(run_with_limit(&task, Duration::from_secs(10))).await;

    let TaskOutcome::Succeeded(report) = outcome else {
        panic!("expected success");
    };
    let lines: Vec<&str> = report.stdout_summary.lines().collect();
    assert_eq!(lines.len(), flow::exec::task_runner::SUMMARY_LINES);
    assert_eq!(lines.first(), Some(&"line31"));
    assert_eq!(lines.last(), Some(&"line50"));
}

#[tokio::test]
async fn time_limit_kills_the_process() {
    init_tracing();

    let task = scheduled("sleepy", "sleep 30");
    let started = Instant::now();
    let outcome = with_timeout(run_with_limit(&task, Duration::from_millis(200))).await;

    assert!(started.elapsed() < Duration::from_secs(4));
    match outcome {
        TaskOutcome::Failed { reason, report } => {
            assert_eq!(reason, FailureReason::TimeLimitExceeded { limit_minutes: 1 });
            assert_eq!(report.exit_code, None);
        }
        other => panic!("expected time limit failure, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_signal_terminates_and_reports_cancelled() {
    init_tracing();

    let task = scheduled("forever", "sleep 30");
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = cancel_tx.send(());
    });

    let outcome = with_timeout(execute_with_limit(
        &task,
        &ExecSettings::default(),
        Duration::from_secs(60),
        cancel_rx,
    ))
    .await;

    assert_eq!(outcome, TaskOutcome::Cancelled);
}

#[tokio::test]
async fn binary_output_does_not_break_a_successful_task() {
    init_tracing();

    // Invalid UTF-8 first, then more output than a pipe buffer holds.
    let task = scheduled(
        "binary",
        "printf '\\377\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; echo done",
    );
    let outcome = with_timeout(run_with_limit(&task, Duration::from_secs(5))).await;

    let TaskOutcome::Succeeded(report) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    let lines: Vec<&str> = report.stdout_summary.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "\u{FFFD}");
    assert_eq!(lines[1].len(), 300_000);
    assert_eq!(lines[2], "done");
}

#[cfg(target_os = "linux")]
fn process_is_gone(pid: &str) -> bool {
    // A zombie only waits for its new parent to reap it.
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
async fn assert_background_child_is_killed(pid_file: &std::path::Path) {
    let pid = std::fs::read_to_string(pid_file).unwrap();
    let pid = pid.trim();
    assert!(!pid.is_empty());

    let deadline = Instant::now() + Duration::from_secs(3);
    while !process_is_gone(pid) {
        assert!(Instant::now() < deadline, "background process {pid} survived its task");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn time_limit_kills_background_children_too() {
    init_tracing();

    let work = tempfile::tempdir().unwrap();
    let pid_file = work.path().join("child.pid");
    let task = scheduled(
        "spawner",
        &format!("sleep 37.4321 & echo $! > '{}'; wait", pid_file.display()),
    );

    let outcome = with_timeout(run_with_limit(&task, Duration::from_millis(500))).await;

    assert!(matches!(
        outcome,
        TaskOutcome::Failed {
            reason: FailureReason::TimeLimitExceeded { .. },
            ..
        }
    ));
    assert_background_child_is_killed(&pid_file).await;
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn cancel_kills_background_children_too() {
    init_tracing();

    let work = tempfile::tempdir().unwrap();
    let pid_file = work.path().join("child.pid");
    let task = scheduled(
        "spawner",
        &format!("sleep 38.5432 & echo $! > '{}'; wait", pid_file.display()),
    );
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = cancel_tx.send(());
    });

    let outcome = with_timeout(execute_with_limit(
        &task,
        &ExecSettings::default(),
        Duration::from_secs(60),
        cancel_rx,
    ))
    .await;

    assert_eq!(outcome, TaskOutcome::Cancelled);
    assert_background_child_is_killed(&pid_file).await;
}

#[tokio::test]
async fn unknown_runner_binary_is_a_runtime_failure() {
    init_tracing();

    let settings = ExecSettings {
        job_runner: flow::types::JobRunner::Singularity,
        singularity_bin: "/nonexistent/flow-test-singularity".to_string(),
        ..ExecSettings::default()
    };
    let task = scheduled("nobin", "true");
    let (_cancel_tx, cancel_rx) = oneshot::channel::<()>();

    let outcome = with_timeout(execute_with_limit(
        &task,
        &settings,
        Duration::from_secs(10),
        cancel_rx,
    ))
    .await;

    assert!(matches!(
        outcome,
        TaskOutcome::Failed {
            reason: FailureReason::Runtime(_),
            ..
        }
    ));
}

#[tokio::test]
async fn real_backend_runs_a_chain_and_writes_task_logs() {
    init_tracing();

    let work = tempfile::tempdir().unwrap();
    let logs = work.path().join("logs");
    std::fs::create_dir_all(&logs).unwrap();

    let a_out = work.path().join("a.txt");
    let b_out = work.path().join("b.txt");
    let a_out_s = a_out.to_string_lossy().into_owned();
    let b_out_s = b_out.to_string_lossy().into_owned();

    let tasks = vec![
        TaskBuilder::new("produce")
            .command(&format!("echo hello > '{a_out_s}'; echo produced"))
            .output(&a_out_s)
            .build(),
        TaskBuilder::new("consume")
            .command(&format!("cat '{a_out_s}' > '{b_out_s}'"))
            .input(&a_out_s)
            .output(&b_out_s)
            .build(),
    ];

    let settings = ExecSettings {
        log_dir: Some(logs.clone()),
        ..ExecSettings::default()
    };
    let options = RunOptions {
        budget: BudgetLimits {
            cpus: Some(2),
            memory: Some(1000),
        },
        failure_policy: FailurePolicy::FailFast,
        handle_ctrl_c: false,
    };

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        run_tasks(tasks, &options, move |tx| RealExecutorBackend::new(tx, settings)),
    )
    .await
    .expect("run did not finish in time")
    .unwrap();

    assert!(outcome.is_success(), "{outcome}");
    assert_eq!(std::fs::read_to_string(&b_out).unwrap(), "hello\n");

    let stdout_log = std::fs::read_to_string(logs.join("0-produce.stdout")).unwrap();
    assert_eq!(stdout_log, "produced\n");
}

#[tokio::test]
async fn real_backend_reports_failures_in_the_outcome() {
    init_tracing();

    let tasks = vec![
        TaskBuilder::new("fails").command("exit 7").output("/nonexistent/flow/x").build(),
        TaskBuilder::new("needs_x").command("true").input("/nonexistent/flow/x").build(),
    ];
    let options = RunOptions::default();

    let outcome = tokio::time::timeout(
        Duration::from_secs(20),
        run_tasks(tasks, &options, |tx| {
            RealExecutorBackend::new(tx, ExecSettings::default())
        }),
    )
    .await
    .expect("run did not finish in time")
    .unwrap();

    assert!(!outcome.is_success());
    assert_eq!(outcome.failed_names(), vec!["fails"]);
    assert_eq!(outcome.failed[0].reason, FailureReason::NonZeroExit(7));
    assert_eq!(outcome.skipped_names(), vec!["needs_x"]);
}
