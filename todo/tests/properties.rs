//! Property tests for the reducer and the query functions

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use proptest::prelude::*;
use std::sync::Arc;
use taskstore_testing::{SequentialIdGenerator, test_clock};
use todo::query::{filter, sort};
use todo::{
    CreateTaskInput, Priority, SortDirection, SortField, Status, TaskAction, TaskEnvironment,
    TaskFilter, TaskService, TaskSort, reduce,
};

fn env() -> TaskEnvironment {
    TaskEnvironment::new(Arc::new(test_clock()), Arc::new(SequentialIdGenerator::new("todo")))
}

fn priority() -> impl Strategy<Value = Priority> {
    prop_oneof![Just(Priority::Low), Just(Priority::Medium), Just(Priority::High)]
}

fn title() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,30}"
}

fn inputs() -> impl Strategy<Value = Vec<CreateTaskInput>> {
    prop::collection::vec(
        (title(), priority()).prop_map(|(t, p)| CreateTaskInput::new(t).with_priority(p)),
        0..12,
    )
}

fn sort_order() -> impl Strategy<Value = TaskSort> {
    let field = prop_oneof![
        Just(SortField::CreatedAt),
        Just(SortField::UpdatedAt),
        Just(SortField::Priority),
        Just(SortField::Title),
    ];
    let direction = prop_oneof![Just(SortDirection::Asc), Just(SortDirection::Desc)];
    (field, direction).prop_map(|(f, d)| TaskSort::new(f, d))
}

fn build(inputs: &[CreateTaskInput], env: &TaskEnvironment) -> Vec<todo::Task> {
    inputs.iter().fold(Vec::new(), |tasks, input| {
        reduce(&tasks, &TaskAction::add(input.clone()), env).unwrap()
    })
}

proptest! {
    #[test]
    fn add_grows_by_one_pending_task(inputs in inputs(), extra in title()) {
        let env = env();
        let tasks = build(&inputs, &env);
        let next = reduce(&tasks, &TaskAction::add(CreateTaskInput::new(extra.clone())), &env).unwrap();

        prop_assert_eq!(next.len(), tasks.len() + 1);
        prop_assert_eq!(&next[..tasks.len()], &tasks[..]);
        let added = &next[tasks.len()];
        prop_assert_eq!(added.status, Status::Pending);
        prop_assert_eq!(added.title.as_str(), extra.trim());
    }

    #[test]
    fn toggling_twice_restores_status(inputs in inputs(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!inputs.is_empty());
        let env = env();
        let tasks = build(&inputs, &env);
        let id = tasks[pick.index(tasks.len())].id.clone();

        let once = reduce(&tasks, &TaskAction::Toggle(id.clone()), &env).unwrap();
        let twice = reduce(&once, &TaskAction::Toggle(id), &env).unwrap();

        let statuses = |ts: &[todo::Task]| ts.iter().map(|t| t.status).collect::<Vec<_>>();
        prop_assert_eq!(statuses(&twice), statuses(&tasks));
        prop_assert_ne!(statuses(&once), statuses(&tasks));
    }

    #[test]
    fn delete_is_idempotent(inputs in inputs(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!inputs.is_empty());
        let env = env();
        let tasks = build(&inputs, &env);
        let id = tasks[pick.index(tasks.len())].id.clone();

        let once = reduce(&tasks, &TaskAction::Delete(id.clone()), &env).unwrap();
        let twice = reduce(&once, &TaskAction::Delete(id.clone()), &env).unwrap();

        prop_assert_eq!(once.len(), tasks.len() - 1);
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.iter().all(|t| t.id != id));
    }

    #[test]
    fn empty_filter_keeps_everything(inputs in inputs()) {
        let tasks = build(&inputs, &env());
        prop_assert_eq!(filter(&tasks, &TaskFilter::all()), tasks);
    }

    #[test]
    fn filter_results_match_every_criterion(
        inputs in inputs(),
        wanted in priority(),
        needle in "[a-z]{1,2}",
    ) {
        let tasks = build(&inputs, &env());
        let criteria = TaskFilter::all().priority(wanted).search(needle.clone());

        for task in filter(&tasks, &criteria) {
            prop_assert_eq!(task.priority, wanted);
            prop_assert!(task.title.to_lowercase().contains(&needle));
        }
    }

    #[test]
    fn sort_is_a_permutation_and_leaves_input_alone(inputs in inputs(), order in sort_order()) {
        let tasks = build(&inputs, &env());
        let before = tasks.clone();
        let sorted = sort(&tasks, &order);

        prop_assert_eq!(&tasks, &before);
        prop_assert_eq!(sorted.len(), tasks.len());
        let mut sorted_ids: Vec<_> = sorted.iter().map(|t| t.id.clone()).collect();
        let mut input_ids: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
        sorted_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        input_ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        prop_assert_eq!(sorted_ids, input_ids);
    }

    #[test]
    fn service_keeps_every_added_task(inputs in inputs()) {
        let count = tokio_test::block_on(async {
            let service = TaskService::new(env());
            for input in &inputs {
                service.add_task(input.clone()).await.unwrap();
            }
            service.tasks().await.len()
        });

        prop_assert_eq!(count, inputs.len());
    }
}
