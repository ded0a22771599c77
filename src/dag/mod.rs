// src/dag/mod.rs

//! DAG representation and scheduling.
//!
//! - [`graph`] infers the dependency graph from declared file paths.
//! - [`scheduler`] contains the per-run state machine that decides
//!   which tasks are ready to run and admits them within the budget.
//! - [`budget`] tracks CPU / memory in use against the configured ceiling.
//! - [`task_info`] provides task state and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod budget;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use budget::{BudgetLimits, ResourceBudget};
pub use graph::DagGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskState};
