// crates/test-utils/src/builders.rs

#![allow(dead_code)]

use flow::dag::{BudgetLimits, DagGraph};
use flow::task::{ResourceSpec, Task};
use flow::validate::validate_tasks;

/// Container reference used by builder tasks unless overridden.
pub const TEST_CONTAINER: &str = "docker://alpine:3";

/// A complete resource request: 1 cpu, 100 MB, 10 minutes.
pub fn complete_resources() -> ResourceSpec {
    ResourceSpec {
        cpus: Some(1),
        memory: Some(100),
        time: Some(10),
        container: Some(TEST_CONTAINER.to_string()),
        extra_args: None,
    }
}

/// Builder for `Task` to simplify test setup.
///
/// Starts from [`complete_resources`]; use the setters (or
/// [`TaskBuilder::no_resources`]) to make the request incomplete.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task::new(name, format!("echo {name}")).with_resources(complete_resources()),
        }
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.task.command = cmd.to_string();
        self
    }

    pub fn input(mut self, path: &str) -> Self {
        self.task.inputs.push(path.to_string());
        self
    }

    pub fn output(mut self, path: &str) -> Self {
        self.task.outputs.push(path.to_string());
        self
    }

    pub fn cpus(mut self, cpus: Option<u32>) -> Self {
        self.task.resources.cpus = cpus;
        self
    }

    pub fn memory(mut self, memory: Option<u64>) -> Self {
        self.task.resources.memory = memory;
        self
    }

    pub fn time(mut self, minutes: Option<u64>) -> Self {
        self.task.resources.time = minutes;
        self
    }

    pub fn container(mut self, container: Option<&str>) -> Self {
        self.task.resources.container = container.map(str::to_string);
        self
    }

    pub fn no_resources(mut self) -> Self {
        self.task.resources = ResourceSpec::default();
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// Linear chain `t0 -> t1 -> ... -> t{n-1}` linked through `/data/c{i}` files.
pub fn chain(n: usize) -> Vec<Task> {
    (0..n)
        .map(|i| {
            let mut b = TaskBuilder::new(&format!("t{i}")).output(&format!("/data/c{i}"));
            if i > 0 {
                b = b.input(&format!("/data/c{}", i - 1));
            }
            b.build()
        })
        .collect()
}

/// Validate with an unlimited budget and build the graph.
pub fn graph_of(tasks: Vec<Task>) -> DagGraph {
    let nodes = validate_tasks(tasks, &BudgetLimits::unlimited())
        .expect("builder tasks should have complete resources");
    DagGraph::build(nodes).expect("builder tasks should form a DAG")
}
