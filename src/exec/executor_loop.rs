// src/exec/executor_loop.rs

//! Background loop owning every running task process.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::exec::command::ExecSettings;
use crate::exec::task_runner::run_task;
use crate::task::TaskId;

const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Request sent from the backend to the executor loop.
#[derive(Debug)]
pub enum ExecRequest {
    Run(ScheduledTask),
    Cancel(Vec<TaskId>),
}

/// A task whose runner has been spawned.
///
/// Dropping `cancel` without sending also terminates the process, so the
/// loop shutting down takes its children with it.
struct Running {
    name: String,
    cancel: Option<oneshot::Sender<()>>,
    runner: JoinHandle<()>,
}

/// Spawn the executor loop and return the sender that feeds it.
///
/// Tasks run concurrently, one Tokio task each; each reports exactly one
/// `TaskCompleted` on `runtime_tx`. The loop ends when every sender is
/// dropped.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    settings: ExecSettings,
) -> mpsc::Sender<ExecRequest> {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(REQUEST_CHANNEL_CAPACITY);
    let settings = Arc::new(settings);

    tokio::spawn(async move {
        debug!(runner = ?settings.job_runner, "executor loop started");
        let mut running: HashMap<TaskId, Running> = HashMap::new();

        while let Some(request) = rx.recv().await {
            running.retain(|_, r| !r.runner.is_finished());

            match request {
                ExecRequest::Run(task) => start(task, &mut running, &runtime_tx, &settings),
                ExecRequest::Cancel(ids) => {
                    for id in ids {
                        cancel(id, &mut running);
                    }
                }
            }
        }

        if !running.is_empty() {
            warn!(
                tasks = running.len(),
                "executor loop closing with tasks still running; terminating them"
            );
        }
        debug!("executor loop finished");
    });

    tx
}

fn start(
    task: ScheduledTask,
    running: &mut HashMap<TaskId, Running>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    settings: &Arc<ExecSettings>,
) {
    let id = task.id;
    if let Some(existing) = running.get(&id) {
        warn!(task = %existing.name, id = %id, "task is already running; ignoring");
        return;
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let name = task.name.clone();
    let runtime_tx = runtime_tx.clone();
    let settings = Arc::clone(settings);

    let runner = tokio::spawn(async move {
        run_task(task, &settings, runtime_tx, cancel_rx).await;
    });

    running.insert(
        id,
        Running {
            name,
            cancel: Some(cancel_tx),
            runner,
        },
    );
}

fn cancel(id: TaskId, running: &mut HashMap<TaskId, Running>) {
    let Some(entry) = running.get_mut(&id) else {
        debug!(id = %id, "cancel for a task that is no longer running");
        return;
    };

    match entry.cancel.take() {
        Some(tx) => {
            info!(task = %entry.name, id = %id, "cancelling task");
            // Err means the runner already returned; its completion is on the way.
            let _ = tx.send(());
        }
        None => debug!(task = %entry.name, id = %id, "task already cancelled"),
    }
}
