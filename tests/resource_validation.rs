// tests/resource_validation.rs

use flow::dag::BudgetLimits;
use flow::errors::{FlowError, ResourceField};
use flow::task::TaskId;
use flow::validate::validate_tasks;
use flow_test_utils::builders::TaskBuilder;

fn missing_field(err: FlowError) -> (String, ResourceField) {
    match err {
        FlowError::MissingResourceSpec { task, field } => (task, field),
        other => panic!("expected MissingResourceSpec, got {other:?}"),
    }
}

#[test]
fn complete_tasks_become_nodes_with_list_positions() {
    let nodes = validate_tasks(
        vec![
            TaskBuilder::new("a").build(),
            TaskBuilder::new("b").cpus(Some(4)).memory(Some(2048)).build(),
        ],
        &BudgetLimits::unlimited(),
    )
    .unwrap();

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].id, TaskId(0));
    assert_eq!(nodes[1].id, TaskId(1));
    assert_eq!(nodes[1].resources.cpus, 4);
    assert_eq!(nodes[1].resources.memory_mb, 2048);
    assert_eq!(nodes[1].resources.time_limit_minutes, 10);
    assert_eq!(
        nodes[1].resources.time_limit(),
        std::time::Duration::from_secs(600)
    );
}

#[test]
fn each_missing_field_is_reported_by_name() {
    let cases = [
        (TaskBuilder::new("t").cpus(None).build(), ResourceField::Cpus),
        (TaskBuilder::new("t").memory(None).build(), ResourceField::Memory),
        (TaskBuilder::new("t").time(None).build(), ResourceField::Time),
        (TaskBuilder::new("t").container(None).build(), ResourceField::Container),
    ];

    for (task, expected) in cases {
        let err = validate_tasks(vec![task], &BudgetLimits::unlimited()).unwrap_err();
        let (name, field) = missing_field(err);
        assert_eq!(name, "t");
        assert_eq!(field, expected);
    }
}

#[test]
fn zero_and_blank_values_count_as_missing() {
    let err = validate_tasks(
        vec![TaskBuilder::new("zero").cpus(Some(0)).build()],
        &BudgetLimits::unlimited(),
    )
    .unwrap_err();
    assert_eq!(missing_field(err).1, ResourceField::Cpus);

    let err = validate_tasks(
        vec![TaskBuilder::new("blank").container(Some("   ")).build()],
        &BudgetLimits::unlimited(),
    )
    .unwrap_err();
    assert_eq!(missing_field(err).1, ResourceField::Container);
}

#[test]
fn first_incomplete_task_in_list_order_is_reported() {
    let err = validate_tasks(
        vec![
            TaskBuilder::new("ok").build(),
            TaskBuilder::new("no_mem").memory(None).build(),
            TaskBuilder::new("nothing").no_resources().build(),
        ],
        &BudgetLimits::unlimited(),
    )
    .unwrap_err();

    let (task, field) = missing_field(err);
    assert_eq!(task, "no_mem");
    assert_eq!(field, ResourceField::Memory);
}

#[test]
fn missing_resource_message_names_task_and_field() {
    let err = validate_tasks(
        vec![TaskBuilder::new("bwa").no_resources().build()],
        &BudgetLimits::unlimited(),
    )
    .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("bwa"), "{msg}");
    assert!(msg.contains("cpus"), "{msg}");
}

#[test]
fn task_larger_than_the_budget_is_rejected_up_front() {
    let limits = BudgetLimits {
        cpus: Some(4),
        memory: Some(1000),
    };

    let err = validate_tasks(vec![TaskBuilder::new("big").cpus(Some(8)).build()], &limits)
        .unwrap_err();
    assert!(matches!(err, FlowError::ResourceExceedsBudget { ref task, .. } if task == "big"));

    let err = validate_tasks(vec![TaskBuilder::new("fat").memory(Some(2000)).build()], &limits)
        .unwrap_err();
    assert!(matches!(err, FlowError::ResourceExceedsBudget { .. }));
    assert!(err.is_structural());

    let ok = validate_tasks(
        vec![TaskBuilder::new("exact").cpus(Some(4)).memory(Some(1000)).build()],
        &limits,
    );
    assert!(ok.is_ok());
}
