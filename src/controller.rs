// src/controller.rs

//! Run controller: validate → build graph → schedule and execute → outcome.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::FlowConfig;
use crate::dag::{BudgetLimits, DagGraph, Scheduler};
use crate::engine::{CoreRuntime, RunOutcome, Runtime, RuntimeEvent};
use crate::errors::Result;
use crate::exec::{ExecSettings, ExecutorBackend, RealExecutorBackend};
use crate::task::Task;
use crate::types::FailurePolicy;
use crate::validate::validate_tasks;

/// Capacity of the runtime event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Options for one run, usually derived from [`FlowConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub budget: BudgetLimits,
    pub failure_policy: FailurePolicy,
    /// Translate Ctrl-C into a graceful shutdown of the run.
    pub handle_ctrl_c: bool,
}

impl RunOptions {
    pub fn from_config(cfg: &FlowConfig) -> Self {
        Self {
            budget: cfg.budget,
            failure_policy: cfg.config.failure_policy,
            handle_ctrl_c: false,
        }
    }
}

/// Ordered list of tasks making up one workflow run.
#[derive(Debug, Clone, Default)]
pub struct Queue {
    tasks: Vec<Task>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn into_tasks(self) -> Vec<Task> {
        self.tasks
    }

    /// Run the queue with the production executor configured by `cfg`.
    pub async fn run(self, cfg: &FlowConfig) -> Result<RunOutcome> {
        self.run_with_options(cfg, RunOptions::from_config(cfg)).await
    }

    pub async fn run_with_options(self, cfg: &FlowConfig, options: RunOptions) -> Result<RunOutcome> {
        let settings = ExecSettings::from_config(cfg);
        if let Some(dir) = settings.log_dir.as_ref() {
            std::fs::create_dir_all(dir)?;
        }

        run_tasks(self.tasks, &options, move |tx| RealExecutorBackend::new(tx, settings)).await
    }
}

impl FromIterator<Task> for Queue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

/// Validate resources and build the dependency graph.
///
/// Any error here is structural: no task has been executed.
pub fn plan(tasks: Vec<Task>, budget: &BudgetLimits) -> Result<DagGraph> {
    let nodes = validate_tasks(tasks, budget)?;
    DagGraph::build(nodes)
}

/// Run `tasks` to completion with the executor built by `make_executor`.
///
/// `make_executor` receives the sender on which the backend must report
/// `TaskCompleted` events. Structural problems are returned as `Err`
/// before the executor is created; task failures are reported in the
/// returned [`RunOutcome`].
pub async fn run_tasks<E, F>(tasks: Vec<Task>, options: &RunOptions, make_executor: F) -> Result<RunOutcome>
where
    E: ExecutorBackend,
    F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
{
    if tasks.is_empty() {
        info!("no tasks were added to the queue, nothing to do");
        return Ok(RunOutcome::empty());
    }

    info!(tasks = tasks.len(), "starting workflow");

    let graph = plan(tasks, &options.budget)?;
    let scheduler = Scheduler::new(graph, options.budget, options.failure_policy);

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);
    let executor = make_executor(rt_tx.clone());

    // Ctrl-C → graceful shutdown.
    let ctrl_c = options.handle_ctrl_c.then(|| {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        })
    });
    drop(rt_tx);

    let core = CoreRuntime::new(scheduler);
    let result = Runtime::new(core, rt_rx, executor).run().await;

    if let Some(handle) = ctrl_c {
        handle.abort();
    }

    let outcome = result?;
    if outcome.is_success() {
        info!(tasks = outcome.succeeded.len(), "workflow finished successfully");
    } else {
        warn!(
            failed = ?outcome.failed_names(),
            skipped = ?outcome.skipped_names(),
            interrupted = outcome.interrupted,
            "workflow finished with failures"
        );
    }

    Ok(outcome)
}
