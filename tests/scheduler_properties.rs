// tests/scheduler_properties.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use flow::dag::{BudgetLimits, Scheduler, TaskState};
use flow::engine::{ExecutionReport, FailureReason, TaskOutcome};
use flow::task::{Task, TaskId};
use flow::types::FailurePolicy;
use flow_test_utils::builders::{graph_of, TaskBuilder};

/// A random DAG described as tasks plus their resource needs.
///
/// Acyclicity: task N may only consume outputs of tasks 0..N-1.
#[derive(Debug, Clone)]
struct Workload {
    tasks: Vec<Task>,
    deps: Vec<BTreeSet<usize>>,
}

fn workload_strategy(max_tasks: usize) -> impl Strategy<Value = Workload> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        let deps_strat = proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..3),
            num_tasks,
        );
        let cpus_strat = proptest::collection::vec(1u32..=4, num_tasks);
        let mem_strat = proptest::collection::vec(1u64..=400, num_tasks);

        (deps_strat, cpus_strat, mem_strat).prop_map(move |(raw_deps, cpus, mem)| {
            let mut tasks = Vec::new();
            let mut deps = Vec::new();

            for (i, potential) in raw_deps.into_iter().enumerate() {
                let valid: BTreeSet<usize> = if i == 0 {
                    BTreeSet::new()
                } else {
                    potential.into_iter().map(|d| d % i).collect()
                };

                let mut b = TaskBuilder::new(&format!("task_{i}"))
                    .output(&format!("/w/out_{i}"))
                    .cpus(Some(cpus[i]))
                    .memory(Some(mem[i]));
                for d in &valid {
                    b = b.input(&format!("/w/out_{d}"));
                }

                tasks.push(b.build());
                deps.push(valid);
            }

            Workload { tasks, deps }
        })
    })
}

fn outcome_for(id: TaskId, failing: &HashSet<usize>) -> TaskOutcome {
    if failing.contains(&id.index()) {
        TaskOutcome::Failed {
            reason: FailureReason::NonZeroExit(1),
            report: ExecutionReport::default(),
        }
    } else {
        TaskOutcome::Succeeded(ExecutionReport::default())
    }
}

proptest! {
    #[test]
    fn every_task_ends_terminal_within_budget(
        workload in workload_strategy(12),
        failing in proptest::collection::hash_set(0..12usize, 0..4),
        continue_on_failure in any::<bool>(),
        pick in proptest::collection::vec(any::<usize>(), 64),
    ) {
        let limits = BudgetLimits { cpus: Some(4), memory: Some(500) };
        let policy = if continue_on_failure {
            FailurePolicy::Continue
        } else {
            FailurePolicy::FailFast
        };
        let total = workload.tasks.len();
        let mut scheduler = Scheduler::new(graph_of(workload.tasks.clone()), limits, policy);

        let mut executing: Vec<TaskId> = scheduler
            .start()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        let mut started: Vec<TaskId> = executing.clone();
        let mut steps = 0usize;

        while !executing.is_empty() {
            prop_assert!(scheduler.budget().cpus_in_use() <= 4);
            prop_assert!(scheduler.budget().memory_in_use() <= 500);

            // Complete tasks in an arbitrary order.
            let idx = pick[steps % pick.len()] % executing.len();
            let id = executing.remove(idx);
            steps += 1;

            // Nothing starts before all its dependencies succeeded.
            let newly: Vec<TaskId> = scheduler
                .handle_completion(id, outcome_for(id, &failing))
                .unwrap()
                .into_iter()
                .map(|t| t.id)
                .collect();
            for new_id in &newly {
                for dep in &workload.deps[new_id.index()] {
                    prop_assert_eq!(scheduler.state_of(TaskId(*dep)), Some(TaskState::Succeeded));
                }
            }
            started.extend(newly.iter().copied());
            executing.extend(newly);
        }

        prop_assert!(scheduler.is_finished());
        prop_assert!(scheduler.budget().is_idle());

        // Each task is dispatched at most once.
        let unique: HashSet<TaskId> = started.iter().copied().collect();
        prop_assert_eq!(unique.len(), started.len());

        // Every task appears exactly once in the outcome.
        let outcome = scheduler.outcome();
        prop_assert_eq!(outcome.total(), total);

        // Every dependent of a failed task was skipped.
        for failure in &outcome.failed {
            for (i, deps) in workload.deps.iter().enumerate() {
                if deps.contains(&failure.task.id.index()) {
                    prop_assert_eq!(scheduler.state_of(TaskId(i)), Some(TaskState::Skipped));
                }
            }
        }

        // Without failures, everything succeeds.
        if outcome.failed.is_empty() {
            prop_assert!(outcome.is_success());
            prop_assert_eq!(outcome.succeeded.len(), total);
        }
    }
}
