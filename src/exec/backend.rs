// src/exec/backend.rs

//! The seam between the runtime and whatever actually runs commands.
//!
//! [`RealExecutorBackend`] forwards requests to the process loop in
//! [`super::executor_loop`]. Tests plug in a backend that completes tasks
//! in memory instead.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::{Error, Result};
use crate::task::TaskId;

use super::command::ExecSettings;
use super::executor_loop::{spawn_executor, ExecRequest};

/// Future returned by backend operations.
pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// How admitted tasks get executed.
///
/// Contract: every task passed to `spawn_ready_tasks` produces exactly one
/// `RuntimeEvent::TaskCompleted`, sent only after its process (and
/// container) is gone. `cancel_tasks` on a task that already finished is a
/// no-op.
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_>;

    /// Terminate running tasks; each reports `TaskOutcome::Cancelled`.
    fn cancel_tasks(&mut self, ids: Vec<TaskId>) -> BackendFuture<'_>;
}

/// Production backend: one OS process per task under the configured runner.
pub struct RealExecutorBackend {
    requests: mpsc::Sender<ExecRequest>,
}

impl RealExecutorBackend {
    /// Starts the executor loop right away; it stops when this value is dropped.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, settings: ExecSettings) -> Self {
        Self {
            requests: spawn_executor(runtime_tx, settings),
        }
    }

    fn forward(&self, requests: Vec<ExecRequest>) -> BackendFuture<'static> {
        let tx = self.requests.clone();
        Box::pin(async move {
            for request in requests {
                tx.send(request).await.map_err(Error::from)?;
            }
            Ok(())
        })
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        self.forward(tasks.into_iter().map(ExecRequest::Run).collect())
    }

    fn cancel_tasks(&mut self, ids: Vec<TaskId>) -> BackendFuture<'_> {
        self.forward(vec![ExecRequest::Cancel(ids)])
    }
}
