// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::errors::{FlowError, Result};
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RunOutcome, RuntimeEvent};

/// Async shell around [`CoreRuntime`].
///
/// Completion events from concurrently running tasks arrive on a single
/// channel and are applied one at a time, so the scheduler only ever
/// changes inside this loop. The shell itself makes no decisions; it
/// forwards the core's commands to the `ExecutorBackend`.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Dispatch the initially ready tasks, then process events until every
    /// task is terminal.
    ///
    /// The event channel closing early means completions were lost; that
    /// is reported as an internal scheduling error.
    pub async fn run(mut self) -> Result<RunOutcome> {
        let initial = self.core.start()?;
        let mut keep_running = self.apply(initial).await?;

        while keep_running {
            let Some(event) = self.event_rx.recv().await else {
                return Err(FlowError::InternalScheduling(format!(
                    "event channel closed while tasks {:?} were still running",
                    self.core.scheduler().running_tasks()
                )));
            };

            trace!(?event, "runtime event");
            let step = self.core.step(event)?;
            keep_running = self.apply(step).await?;
        }

        info!("all tasks reached a final state");
        Ok(self.core.outcome())
    }

    /// Carry out the commands of one core step; returns `keep_running`.
    async fn apply(&mut self, step: CoreStep) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) if !tasks.is_empty() => {
                    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
                    debug!(?names, "dispatching tasks");
                    self.executor.spawn_ready_tasks(tasks).await?;
                }
                CoreCommand::CancelTasks(ids) if !ids.is_empty() => {
                    debug!(?ids, "cancelling tasks");
                    self.executor.cancel_tasks(ids).await?;
                }
                CoreCommand::DispatchTasks(_) | CoreCommand::CancelTasks(_) => {}
                CoreCommand::RequestExit => debug!("core requested exit"),
            }
        }
        Ok(step.keep_running)
    }
}
