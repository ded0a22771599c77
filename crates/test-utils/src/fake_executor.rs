// crates/test-utils/src/fake_executor.rs

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use flow::dag::ScheduledTask;
use flow::engine::{ExecutionReport, FailureReason, RuntimeEvent, TaskOutcome};
use flow::exec::{BackendFuture, ExecutorBackend};
use flow::task::TaskId;

/// What the fake executor has seen so far.
#[derive(Debug, Default, Clone)]
pub struct ExecutionLog {
    /// Names of dispatched tasks, in dispatch order.
    pub dispatched: Vec<String>,
    /// Ids passed to `cancel_tasks`, in order.
    pub cancelled: Vec<TaskId>,
}

/// A fake executor that:
/// - records which tasks were dispatched
/// - immediately reports `Succeeded` for each scheduled task, or
///   `Failed(NonZeroExit(1))` for names configured via [`FakeExecutor::failing`]
/// - keeps names configured via [`FakeExecutor::hanging`] running until
///   `cancel_tasks` is called for them, then reports `Cancelled`.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    log: Arc<Mutex<ExecutionLog>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    in_flight: BTreeSet<TaskId>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, log: Arc<Mutex<ExecutionLog>>) -> Self {
        Self {
            runtime_tx,
            log,
            failing: HashSet::new(),
            hanging: HashSet::new(),
            in_flight: BTreeSet::new(),
        }
    }

    pub fn failing<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn hanging<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hanging.extend(names.into_iter().map(Into::into));
        self
    }

    /// Deliver completions from a separate task, in order.
    ///
    /// The runtime only drains its event channel between backend calls, so
    /// sending inline would block once a batch outgrows the channel.
    fn report(&self, completions: Vec<RuntimeEvent>) {
        if completions.is_empty() {
            return;
        }
        let tx = self.runtime_tx.clone();
        tokio::spawn(async move {
            for event in completions {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> BackendFuture<'_> {
        Box::pin(async move {
            let mut completions = Vec::with_capacity(tasks.len());
            for t in tasks {
                self.log.lock().unwrap().dispatched.push(t.name.clone());

                if self.hanging.contains(&t.name) {
                    self.in_flight.insert(t.id);
                    continue;
                }

                let outcome = if self.failing.contains(&t.name) {
                    TaskOutcome::Failed {
                        reason: FailureReason::NonZeroExit(1),
                        report: ExecutionReport {
                            exit_code: Some(1),
                            stderr_summary: format!("{} failed", t.name),
                            ..ExecutionReport::default()
                        },
                    }
                } else {
                    TaskOutcome::Succeeded(ExecutionReport {
                        exit_code: Some(0),
                        ..ExecutionReport::default()
                    })
                };

                completions.push(RuntimeEvent::TaskCompleted { task: t.id, outcome });
            }
            self.report(completions);
            Ok(())
        })
    }

    fn cancel_tasks(&mut self, ids: Vec<TaskId>) -> BackendFuture<'_> {
        Box::pin(async move {
            let mut completions = Vec::new();
            for id in ids {
                self.log.lock().unwrap().cancelled.push(id);
                if self.in_flight.remove(&id) {
                    completions.push(RuntimeEvent::TaskCompleted {
                        task: id,
                        outcome: TaskOutcome::Cancelled,
                    });
                }
            }
            self.report(completions);
            Ok(())
        })
    }
}
