//! Integration tests for the event queue core
//!
//! These follow the lifecycle a streaming transport drives: create-or-tap,
//! produce, drain, close, resubscribe.

use std::sync::Arc;
use std::time::Duration;

use eventqueue::{
    Event, InMemoryQueueManager, InMemoryTaskStateProvider, QueueError, QueueEvent, QueueManager,
    TaskState, TaskStatusUpdateEvent,
};

fn status(task_id: &str, state: TaskState) -> Event {
    Event::StatusUpdate(TaskStatusUpdateEvent::new(task_id, "ctx-1", state))
}

fn state_of(event: &QueueEvent) -> TaskState {
    match event {
        QueueEvent::Event(Event::StatusUpdate(update)) => update.status.state,
        other => panic!("Expected a status update, got {other:?}"),
    }
}

// =============================================================================
// Streaming lifecycle
// =============================================================================

#[tokio::test]
async fn test_working_then_completed_then_closed() {
    let provider = Arc::new(InMemoryTaskStateProvider::new());
    let manager = InMemoryQueueManager::new(provider.clone());

    let mut tap = manager.create_or_tap("t1").await;
    let root = manager.get("t1").expect("root registered");

    root.enqueue(status("t1", TaskState::Working)).await;
    root.enqueue(status("t1", TaskState::Completed)).await;
    provider.mark_finalized("t1");
    root.close().await;

    let first = tap.dequeue(None).await.unwrap().expect("first event");
    assert_eq!(state_of(first.event()), TaskState::Working);
    assert!(!first.is_replicated());

    let second = tap.dequeue(None).await.unwrap().expect("second event");
    assert_eq!(state_of(second.event()), TaskState::Completed);

    assert!(
        matches!(tap.dequeue(None).await, Err(QueueError::Closed(_))),
        "drained tap must observe Closed after root close"
    );
}

#[tokio::test]
async fn test_two_consumers_see_same_order() {
    let manager = InMemoryQueueManager::new(Arc::new(InMemoryTaskStateProvider::new()));

    let mut tap_a = manager.create_or_tap("t1").await;
    let mut tap_b = manager.create_or_tap("t1").await;
    let root = manager.get("t1").unwrap();

    root.enqueue(status("t1", TaskState::Submitted)).await;
    root.enqueue(status("t1", TaskState::Working)).await;
    root.enqueue(status("t1", TaskState::Completed)).await;

    for tap in [&mut tap_a, &mut tap_b] {
        let states: Vec<TaskState> = [
            tap.dequeue(None).await.unwrap().unwrap(),
            tap.dequeue(None).await.unwrap().unwrap(),
            tap.dequeue(None).await.unwrap().unwrap(),
        ]
        .iter()
        .map(|item| state_of(item.event()))
        .collect();
        assert_eq!(
            states,
            vec![TaskState::Submitted, TaskState::Working, TaskState::Completed]
        );
    }
}

#[tokio::test]
async fn test_tap_close_preserves_sibling_and_root() {
    let manager = InMemoryQueueManager::new(Arc::new(InMemoryTaskStateProvider::new()));

    let mut closing = manager.create_or_tap("t1").await;
    let mut sibling = manager.create_or_tap("t1").await;
    let root = manager.get("t1").unwrap();

    closing.close().await;
    assert!(!root.is_closed());

    root.enqueue(status("t1", TaskState::Working)).await;
    let seen = sibling.dequeue(Some(Duration::from_millis(100))).await.unwrap();
    assert!(seen.is_some(), "sibling tap still receives events after a peer closes");
}

// =============================================================================
// Deferred removal
// =============================================================================

#[tokio::test]
async fn test_resubscribe_before_and_after_finalization() {
    let provider = Arc::new(InMemoryTaskStateProvider::new());
    let manager = InMemoryQueueManager::new(provider.clone());

    let _tap = manager.create_or_tap("t1").await;
    let original = manager.get("t1").unwrap();
    original.close().await;

    // Not finalized yet: the closed root is retained and re-tapped
    let _retap = manager.create_or_tap("t1").await;
    assert!(manager.get("t1").unwrap().is_closed());

    // Finalized: a brand-new open root replaces it
    provider.mark_finalized("t1");
    let _fresh_tap = manager.create_or_tap("t1").await;
    let fresh = manager.get("t1").unwrap();
    assert!(!fresh.is_closed());
}

#[tokio::test]
async fn test_manager_close_removes_entry() {
    let manager = InMemoryQueueManager::new(Arc::new(InMemoryTaskStateProvider::new()));

    let mut tap = manager.create_or_tap("t1").await;
    manager.close("t1").await.unwrap();

    assert!(manager.get("t1").is_none());
    assert!(matches!(tap.dequeue(None).await, Err(QueueError::Closed(_))));
    assert!(matches!(manager.close("t1").await, Err(QueueError::NoSuchQueue(_))));
}

// =============================================================================
// Poller-start handshake
// =============================================================================

#[tokio::test]
async fn test_producer_waits_for_consumer_loop() {
    let manager = Arc::new(InMemoryQueueManager::new(Arc::new(InMemoryTaskStateProvider::new())));

    let mut tap = manager.create_or_tap("t1").await;
    let root = manager.get("t1").unwrap();

    let waiting_manager = Arc::clone(&manager);
    let waiting_root = root.clone();
    let producer = tokio::spawn(async move {
        waiting_manager.await_poller_start(&waiting_root).await
    });

    // Consumer begins polling; the producer's wait resolves
    let consumer = tokio::spawn(async move { tap.dequeue(None).await });
    producer.await.unwrap().expect("poller start must be signaled");

    root.enqueue(status("t1", TaskState::Working)).await;
    let item = consumer.await.unwrap().unwrap();
    assert!(item.is_some());
}
