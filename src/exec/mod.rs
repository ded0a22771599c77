// src/exec/mod.rs

//! Process execution layer.
//!
//! Runs each admitted task as an OS process under the configured job
//! runner and reports its completion back to the runtime.
//!
//! - [`command`] builds the invocation for local, singularity and docker runs.
//! - [`task_runner`] runs one task: time limit, cancellation, teardown and
//!   output summaries.
//! - [`executor_loop`] tracks running tasks and routes cancel requests.
//! - [`backend`] is the trait the runtime talks to.

pub mod backend;
pub mod command;
pub mod executor_loop;
pub mod task_runner;

pub use backend::{BackendFuture, ExecutorBackend, RealExecutorBackend};
pub use command::ExecSettings;
pub use executor_loop::spawn_executor;
