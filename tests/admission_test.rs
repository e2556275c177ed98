mod common;

use chrono::{Duration, Utc};
use common::strategies::*;
use proptest::prelude::*;
use std::sync::Arc;
use tasker_events::admission::{AdmissionController, TaskDefRegistry};
use tasker_events::database::{ExecutionStore, InMemoryExecutionStore};
use tasker_events::models::{Task, TaskDef, TaskStatus};

fn controller(store: &InMemoryExecutionStore, def: TaskDef) -> AdmissionController {
    AdmissionController::new(
        Arc::new(store.clone()),
        Arc::new(TaskDefRegistry::from_defs([def])),
    )
}

fn http_task(reference: &str, status: TaskStatus) -> Task {
    Task::new("wf-admission", reference, "HTTP").with_status(status)
}

proptest! {
    /// Non-positive concurrency limits never deny, whatever is in flight
    #[test]
    fn unlimited_definitions_never_deny(limit in unlimited_concurrency_strategy(), running in in_progress_count_strategy()) {
        tokio_test::block_on(async {
            let store = InMemoryExecutionStore::new();
            let gate = controller(&store, TaskDef::new("HTTP").with_concurrency_limit(limit));
            let tasks: Vec<Task> = (0..running)
                .map(|i| http_task(&format!("t{i}"), TaskStatus::InProgress))
                .collect();
            store.create_tasks(&tasks).await.unwrap();

            let candidate = http_task("candidate", TaskStatus::Scheduled);
            store.create_tasks(&[candidate.clone()]).await.unwrap();
            prop_assert!(!gate.exceeds_in_progress_limit(&candidate).await.unwrap());
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// At most `limit` checks succeed inside one window
    #[test]
    fn rate_limit_admits_exactly_limit_per_window((limit, window) in rate_limit_strategy()) {
        tokio_test::block_on(async {
            let store = InMemoryExecutionStore::new();
            let gate = controller(&store, TaskDef::new("HTTP").with_rate_limit(limit, window));
            let task = http_task("t", TaskStatus::Scheduled);
            let now = Utc::now();

            let mut admitted = 0;
            for _ in 0..(limit + 3) {
                if !gate.exceeds_rate_limit_per_frequency_at(&task, now).await.unwrap() {
                    admitted += 1;
                }
            }
            prop_assert_eq!(admitted, limit);
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_fifo_window_advances_when_a_slot_frees() {
    let store = InMemoryExecutionStore::new();
    let gate = controller(&store, TaskDef::new("HTTP").with_concurrency_limit(2));

    let mut first = http_task("t1", TaskStatus::InProgress);
    let second = http_task("t2", TaskStatus::InProgress);
    let third = http_task("t3", TaskStatus::Scheduled);
    store
        .create_tasks(&[first.clone(), second.clone(), third.clone()])
        .await
        .unwrap();

    assert!(!gate.exceeds_in_progress_limit(&first).await.unwrap());
    assert!(!gate.exceeds_in_progress_limit(&second).await.unwrap());
    assert!(gate.exceeds_in_progress_limit(&third).await.unwrap());

    first.set_status(TaskStatus::Completed);
    store.update_task(&first).await.unwrap();

    assert!(!gate.exceeds_in_progress_limit(&third).await.unwrap());
}

#[tokio::test]
async fn test_over_admitted_task_waits_for_its_turn() {
    let store = InMemoryExecutionStore::new();
    let gate = controller(&store, TaskDef::new("HTTP").with_concurrency_limit(2));

    let mut first = http_task("t1", TaskStatus::InProgress);
    let second = http_task("t2", TaskStatus::InProgress);
    let third = http_task("t3", TaskStatus::InProgress);
    store
        .create_tasks(&[first.clone(), second.clone(), third.clone()])
        .await
        .unwrap();

    // three in flight, the window holds the first two by insertion order
    assert!(gate.exceeds_in_progress_limit(&third).await.unwrap());

    first.set_status(TaskStatus::Completed);
    store.update_task(&first).await.unwrap();
    assert!(!gate.exceeds_in_progress_limit(&second).await.unwrap());
    assert!(!gate.exceeds_in_progress_limit(&third).await.unwrap());
}

#[tokio::test]
async fn test_rate_limit_window_elapses() {
    let store = InMemoryExecutionStore::new();
    let gate = controller(&store, TaskDef::new("HTTP").with_rate_limit(2, 60));
    let task = http_task("t", TaskStatus::Scheduled);
    let start = Utc::now();

    assert!(!gate.exceeds_rate_limit_per_frequency_at(&task, start).await.unwrap());
    assert!(!gate
        .exceeds_rate_limit_per_frequency_at(&task, start + Duration::seconds(5))
        .await
        .unwrap());
    assert!(gate
        .exceeds_rate_limit_per_frequency_at(&task, start + Duration::seconds(30))
        .await
        .unwrap());
    assert!(!gate
        .exceeds_rate_limit_per_frequency_at(&task, start + Duration::seconds(70))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_rate_limits_are_per_definition() {
    let store = InMemoryExecutionStore::new();
    let defs = TaskDefRegistry::from_defs([
        TaskDef::new("HTTP").with_rate_limit(1, 60),
        TaskDef::new("KAFKA").with_rate_limit(1, 60),
    ]);
    let gate = AdmissionController::new(Arc::new(store.clone()), Arc::new(defs));
    let now = Utc::now();

    let http = http_task("h", TaskStatus::Scheduled);
    let kafka = Task::new("wf", "k", "KAFKA");
    assert!(!gate.exceeds_rate_limit_per_frequency_at(&http, now).await.unwrap());
    assert!(!gate.exceeds_rate_limit_per_frequency_at(&kafka, now).await.unwrap());
    assert!(gate.exceeds_rate_limit_per_frequency_at(&http, now).await.unwrap());
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let store = InMemoryExecutionStore::new();
    let gate = controller(
        &store,
        TaskDef::new("HTTP")
            .with_concurrency_limit(1)
            .with_rate_limit(1, 60),
    );
    let task = http_task("t", TaskStatus::Scheduled);
    store.set_unavailable(true);

    assert!(gate.exceeds_in_progress_limit(&task).await.is_err());
    assert!(gate.exceeds_rate_limit_per_frequency(&task).await.is_err());
}

#[tokio::test]
async fn test_concurrent_rate_checks_do_not_double_count() {
    let store = InMemoryExecutionStore::new();
    let gate = Arc::new(controller(&store, TaskDef::new("HTTP").with_rate_limit(3, 60)));
    let now = Utc::now();

    let mut handles = Vec::new();
    for i in 0..10 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            let task = http_task(&format!("t{i}"), TaskStatus::Scheduled);
            gate.exceeds_rate_limit_per_frequency_at(&task, now).await.unwrap()
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if !handle.await.unwrap() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 3);
    assert_eq!(store.rate_bucket_count("HTTP").await, 3);
}
