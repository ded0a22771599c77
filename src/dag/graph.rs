// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use crate::errors::{FlowError, Result};
use crate::task::{TaskId, TaskNode};

/// Internal node structure: the task plus its immediate neighbours.
#[derive(Debug, Clone)]
struct DagNode {
    task: TaskNode,
    /// Producers of at least one of this task's inputs.
    deps: Vec<TaskId>,
    /// Consumers of at least one of this task's outputs.
    dependents: Vec<TaskId>,
}

/// Dependency graph inferred from declared file paths.
///
/// An edge `A -> B` exists when some output path of `A` is byte-for-byte
/// equal to some input path of `B`. Inputs nobody produces are external
/// files and add no edge. Built once per run; immutable afterwards.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: Vec<DagNode>,
    graph: DiGraph<TaskId, ()>,
    order: Vec<TaskId>,
}

impl DagGraph {
    /// Build the graph from validated tasks.
    ///
    /// Fails with:
    /// - `AmbiguousProducer` if two tasks declare the same output path
    /// - `CyclicDependency` if the inferred edges contain a cycle
    ///   (including a task consuming its own output)
    pub fn build(tasks: Vec<TaskNode>) -> Result<Self> {
        for (index, task) in tasks.iter().enumerate() {
            if task.id.index() != index {
                return Err(FlowError::InternalScheduling(format!(
                    "task {} handed to the graph builder at position {index}",
                    task.id
                )));
            }
        }

        let producers = index_producers(&tasks)?;

        let mut graph: DiGraph<TaskId, ()> = DiGraph::with_capacity(tasks.len(), 0);
        for task in &tasks {
            graph.add_node(task.id);
        }

        for consumer in &tasks {
            for input in &consumer.inputs {
                if let Some(&producer) = producers.get(input.as_str()) {
                    if producer == consumer.id {
                        return Err(FlowError::CyclicDependency {
                            tasks: vec![consumer.task_ref().to_string()],
                        });
                    }
                    // update_edge collapses several shared paths into one edge.
                    graph.update_edge(
                        NodeIndex::new(producer.index()),
                        NodeIndex::new(consumer.id.index()),
                        (),
                    );
                }
            }
        }

        let order = topological_order(&graph, &tasks)?;

        let nodes = tasks
            .into_iter()
            .map(|task| {
                let ix = NodeIndex::new(task.id.index());
                let deps = sorted_neighbours(&graph, ix, Direction::Incoming);
                let dependents = sorted_neighbours(&graph, ix, Direction::Outgoing);
                DagNode {
                    task,
                    deps,
                    dependents,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            tasks = nodes.len(),
            edges = graph.edge_count(),
            "dependency graph built"
        );

        Ok(Self {
            nodes,
            graph,
            order,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All tasks in submission order.
    pub fn tasks(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.iter().map(|n| &n.task)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(id.index()).map(|n| &n.task)
    }

    /// Immediate dependencies of a task, in ascending id order.
    pub fn dependencies_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(id.index())
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task, in ascending id order.
    pub fn dependents_of(&self, id: TaskId) -> &[TaskId] {
        self.nodes
            .get(id.index())
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_edge(&self, from: TaskId, to: TaskId) -> bool {
        if from.index() >= self.nodes.len() || to.index() >= self.nodes.len() {
            return false;
        }
        self.graph
            .find_edge(NodeIndex::new(from.index()), NodeIndex::new(to.index()))
            .is_some()
    }

    /// All edges as `(producer, consumer)` pairs, sorted.
    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        let mut edges: Vec<_> = self
            .graph
            .raw_edges()
            .iter()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect();
        edges.sort();
        edges
    }

    /// A valid execution order (every producer before its consumers).
    pub fn topological_order(&self) -> &[TaskId] {
        &self.order
    }
}

/// Map every declared output path to the one task that produces it.
fn index_producers(tasks: &[TaskNode]) -> Result<HashMap<&str, TaskId>> {
    let mut producers: HashMap<&str, TaskId> = HashMap::new();

    for task in tasks {
        for output in &task.outputs {
            match producers.get(output.as_str()) {
                Some(&first) if first != task.id => {
                    return Err(FlowError::AmbiguousProducer {
                        path: output.clone(),
                        first: tasks[first.index()].task_ref().to_string(),
                        second: task.task_ref().to_string(),
                    });
                }
                // The same task listing a path twice is harmless.
                Some(_) => {}
                None => {
                    producers.insert(output.as_str(), task.id);
                }
            }
        }
    }

    Ok(producers)
}

fn topological_order(graph: &DiGraph<TaskId, ()>, tasks: &[TaskNode]) -> Result<Vec<TaskId>> {
    match toposort(graph, None) {
        Ok(order) => Ok(order.into_iter().map(|ix| graph[ix]).collect()),
        Err(cycle) => {
            let start = cycle.node_id();
            let members = tarjan_scc(graph)
                .into_iter()
                .find(|scc| scc.contains(&start))
                .unwrap_or_else(|| vec![start]);

            let mut ids: Vec<TaskId> = members.into_iter().map(|ix| graph[ix]).collect();
            ids.sort();

            Err(FlowError::CyclicDependency {
                tasks: ids
                    .into_iter()
                    .map(|id| tasks[id.index()].task_ref().to_string())
                    .collect(),
            })
        }
    }
}

fn sorted_neighbours(
    graph: &DiGraph<TaskId, ()>,
    ix: NodeIndex,
    direction: Direction,
) -> Vec<TaskId> {
    let mut ids: Vec<TaskId> = graph
        .neighbors_directed(ix, direction)
        .map(|n| graph[n])
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
