mod common;

use common::*;
use dlq_manager::broker::{BrokerClient, BrokerError, BrokerSession, InMemoryBroker};
use dlq_manager::config::CompleteSearch;
use dlq_manager::models::{MessageStatus, ReceiveMode, SubQueue};
use dlq_manager::AppError;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn recording(inner: InMemoryBroker) -> RecordingBroker {
    RecordingBroker::new(inner)
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_returns_every_message_in_sequence_order() {
    let inner = in_memory_broker();
    let seeded = seed_numbered(&inner, 25);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let messages = manager.list_messages().await.unwrap();

    assert_eq!(messages.len(), 25);
    let positions: Vec<i64> = messages.iter().map(|m| m.sequence_number).collect();
    assert_eq!(positions, seeded);
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Three round-trips; the short third batch ends the loop
    assert_eq!(broker.log.peek_positions(), vec![0, 11, 21]);
}

#[tokio::test]
async fn test_list_full_final_batch_needs_one_more_peek() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 20);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let messages = manager.list_messages().await.unwrap();

    assert_eq!(messages.len(), 20);
    assert_eq!(broker.log.peek_positions(), vec![0, 11, 21]);
}

#[tokio::test]
async fn test_list_is_idempotent() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 13);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(4));

    let first = manager.list_messages().await.unwrap();
    let second = manager.list_messages().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 13);
}

#[tokio::test]
async fn test_list_empty_sub_queue() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(10));

    let messages = manager.list_messages().await.unwrap();

    assert!(messages.is_empty());
    assert_eq!(broker.log.peek_positions(), vec![0]);
}

#[tokio::test]
async fn test_list_carries_dead_letter_diagnostics() {
    let inner = in_memory_broker();
    inner
        .dead_letter(QUEUE, "m1", "payload", Some("TTLExpiredException"), Some("expired after 14d"))
        .unwrap();
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let messages = manager.list_messages().await.unwrap();

    assert_eq!(messages[0].dead_letter_reason.as_deref(), Some("TTLExpiredException"));
    assert_eq!(
        messages[0].dead_letter_description.as_deref(),
        Some("expired after 14d")
    );
}

#[tokio::test]
async fn test_peek_page_follows_cursor() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 5);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let first = manager.peek_page(0, Some(2)).await.unwrap();
    assert_eq!(first.messages.len(), 2);
    assert_eq!(first.next_sequence, Some(3));

    let second = manager.peek_page(3, Some(2)).await.unwrap();
    assert_eq!(second.messages[0].message_id, "m3");
    assert_eq!(second.next_sequence, Some(5));

    let last = manager.peek_page(5, Some(2)).await.unwrap();
    assert_eq!(last.messages.len(), 1);
    assert_eq!(last.next_sequence, None);
}

// ============================================================================
// Targeted completion
// ============================================================================

#[tokio::test]
async fn test_complete_acknowledges_first_match_only() {
    let inner = in_memory_broker();
    seed(&inner, &["a", "b", "a"]);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let completed = manager.complete_message("a").await.unwrap().unwrap();

    assert_eq!(completed.message_id, "a");
    assert_eq!(completed.status, MessageStatus::Processed);
    assert_eq!(broker.log.completes.load(Ordering::SeqCst), 1);

    let remaining = manager.list_messages().await.unwrap();
    let remaining: Vec<(i64, &str)> = remaining
        .iter()
        .map(|m| (m.sequence_number, m.message_id.as_str()))
        .collect();
    assert_eq!(remaining, vec![(2, "b"), (3, "a")]);
}

#[tokio::test]
async fn test_complete_unknown_identifier_is_not_found() {
    let inner = in_memory_broker();
    seed(&inner, &["a", "b"]);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let result = manager.complete_message("zzz").await.unwrap();

    assert!(result.is_none());
    assert_eq!(broker.log.completes.load(Ordering::SeqCst), 0);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 2);
}

#[tokio::test]
async fn test_complete_on_empty_sub_queue_is_not_found() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(10));

    assert!(manager.complete_message("a").await.unwrap().is_none());
}

#[tokio::test]
async fn test_complete_requires_identifier() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(10));

    let result = manager.complete_message("  ").await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(broker.log.opens.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_batch_leaves_other_locks_to_expire() {
    let inner = InMemoryBroker::new(Duration::from_millis(100)).with_queue(QUEUE);
    seed(&inner, &["a", "b", "c"]);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    manager.complete_message("a").await.unwrap().unwrap();
    assert_eq!(broker.log.abandons.load(Ordering::SeqCst), 0);

    // "b" and "c" are still locked by the finished invocation
    assert!(manager.list_leased().await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;

    let leased = manager.list_leased().await.unwrap();
    let ids: Vec<&str> = leased.iter().map(|m| m.message.message_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[tokio::test]
async fn test_single_batch_misses_target_beyond_first_batch() {
    let inner = in_memory_broker();
    seed(&inner, &["x", "y", "target"]);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(2));

    assert!(manager.complete_message("target").await.unwrap().is_none());
    assert_eq!(broker.log.receives.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_exhaustive_search_finds_target_and_abandons_the_rest() {
    let inner = in_memory_broker();
    seed(&inner, &["x", "y", "target", "z"]);
    let broker = recording(inner);
    let mut config = small_batches(2);
    config.complete_search = CompleteSearch::Exhaustive;
    let manager = manager(&broker, config);

    let completed = manager.complete_message("target").await.unwrap().unwrap();

    assert_eq!(completed.message_id, "target");
    assert_eq!(broker.log.receives.load(Ordering::SeqCst), 2);
    // "x", "y" from the first batch and "z" from the second
    assert_eq!(broker.log.abandons.load(Ordering::SeqCst), 3);

    // Abandoned messages are immediately receivable again
    let leased = manager.list_leased().await.unwrap();
    let leased_ids: Vec<&str> = leased.iter().map(|m| m.message.message_id.as_str()).collect();
    assert_eq!(leased_ids, vec!["x", "y"]);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 3);
}

#[tokio::test]
async fn test_exhaustive_search_not_found_abandons_everything() {
    let inner = in_memory_broker();
    seed(&inner, &["x", "y", "z"]);
    let broker = recording(inner);
    let mut config = small_batches(2);
    config.complete_search = CompleteSearch::Exhaustive;
    let manager = manager(&broker, config);

    assert!(manager.complete_message("target").await.unwrap().is_none());

    // Two full batches, then an empty one
    assert_eq!(broker.log.receives.load(Ordering::SeqCst), 3);
    assert_eq!(broker.log.abandons.load(Ordering::SeqCst), 3);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 3);
}

#[tokio::test]
async fn test_exhaustive_search_ends_when_locks_expire_mid_search() {
    let inner = InMemoryBroker::new(Duration::from_millis(1)).with_queue(QUEUE);
    seed_numbered(&inner, 200);
    let broker = recording(inner);
    let mut config = small_batches(1);
    config.complete_search = CompleteSearch::Exhaustive;
    let manager = manager(&broker, config);

    let result = tokio::time::timeout(Duration::from_secs(5), manager.complete_message("absent"))
        .await
        .expect("search must terminate");

    assert!(result.unwrap().is_none());
    assert!(broker.log.receives.load(Ordering::SeqCst) <= 201);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 200);
}

#[tokio::test]
async fn test_exhaustive_search_stops_at_first_redelivered_message() {
    let inner = InMemoryBroker::new(Duration::from_millis(30)).with_queue(QUEUE);
    seed(&inner, &["x", "y", "z"]);
    // The third receive starts after the locks on "x" and "y" expired
    let broker = recording(inner).slow_receive_at(3, Duration::from_millis(80));
    let mut config = small_batches(1);
    config.complete_search = CompleteSearch::Exhaustive;
    let manager = manager(&broker, config);

    assert!(manager.complete_message("z").await.unwrap().is_none());

    assert_eq!(broker.log.receives.load(Ordering::SeqCst), 3);
    assert_eq!(broker.log.completes.load(Ordering::SeqCst), 0);
    // Every lock taken is handed back, expired or not
    assert_eq!(broker.log.abandons.load(Ordering::SeqCst), 3);
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 3);
}

#[tokio::test]
async fn test_complete_receive_failure_is_broker_error() {
    let inner = in_memory_broker();
    seed(&inner, &["a"]);
    let broker = recording(inner).failing_receive_at(1);
    let manager = manager(&broker, small_batches(10));

    let result = manager.complete_message("a").await;

    assert!(matches!(
        result,
        Err(AppError::Broker(BrokerError::ReceiveFailed(_)))
    ));
}

// ============================================================================
// Drain
// ============================================================================

#[tokio::test]
async fn test_drain_removes_everything() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 7);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(3));

    let manifest = manager.drain().await.unwrap();

    assert_eq!(manifest.len(), 7);
    assert!(manifest
        .iter()
        .all(|m| m.status == MessageStatus::Processed && m.mode == ReceiveMode::ReceiveAndDelete));
    // 3 + 3 + 1, then the empty batch that ends the loop
    assert_eq!(broker.log.receives.load(Ordering::SeqCst), 4);

    assert!(manager.list_messages().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_drain_empty_sub_queue_returns_empty_manifest() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(3));

    assert!(manager.drain().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_drain_failure_mid_way_reports_removed_messages() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 7);
    let broker = recording(inner).failing_receive_at(2);
    let manager = manager(&broker, small_batches(3));

    let err = manager.drain().await.unwrap_err();

    match err {
        AppError::PartialDrain { removed, source } => {
            let ids: Vec<&str> = removed.iter().map(|m| m.message.message_id.as_str()).collect();
            assert_eq!(ids, vec!["m1", "m2", "m3"]);
            assert!(matches!(source, BrokerError::ReceiveFailed(_)));
        }
        other => panic!("expected partial drain, got {other:?}"),
    }
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 4);
}

#[tokio::test]
async fn test_drain_failure_before_removal_is_plain_broker_error() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 2);
    let broker = recording(inner).failing_receive_at(1);
    let manager = manager(&broker, small_batches(3));

    let err = manager.drain().await.unwrap_err();

    assert!(matches!(err, AppError::Broker(BrokerError::ReceiveFailed(_))));
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 2);
}

// ============================================================================
// Resubmission
// ============================================================================

#[tokio::test]
async fn test_resubmit_preserves_identity() {
    let inner = in_memory_broker();
    seed(&inner, &["m1"]);
    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    let receipt = manager
        .resubmit(Some("m1".to_string()), "payload".to_string())
        .await
        .unwrap();

    assert_eq!(receipt.message_id, "m1");
    assert_eq!(receipt.queue, QUEUE);

    let main = broker.inner.main_queue(QUEUE);
    assert_eq!(main.len(), 1);
    assert_eq!(main[0].message_id, "m1");
    assert_eq!(main[0].body, "payload");

    // The dead-lettered original is untouched
    assert_eq!(broker.inner.dead_letter_len(QUEUE), 1);
}

#[tokio::test]
async fn test_resubmit_without_identifier_gets_one_assigned() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(10));

    let receipt = manager.resubmit(None, "payload".to_string()).await.unwrap();

    assert!(!receipt.message_id.is_empty());
    assert_eq!(broker.inner.main_queue(QUEUE)[0].message_id, receipt.message_id);
}

#[tokio::test]
async fn test_resubmit_empty_body_makes_no_broker_call() {
    let broker = recording(in_memory_broker());
    let manager = manager(&broker, small_batches(10));

    let result = manager.resubmit(Some("m1".to_string()), String::new()).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(broker.log.opens.load(Ordering::SeqCst), 0);
    assert_eq!(broker.log.sends.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Session lifecycle
// ============================================================================

#[tokio::test]
async fn test_sessions_closed_on_every_exit_path() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 4);
    let broker = recording(inner).failing_receive_at(3);
    let manager = manager(&broker, small_batches(2));

    // success
    manager.list_messages().await.unwrap();
    // not found (receive #1)
    assert!(manager.complete_message("nope").await.unwrap().is_none());
    // success (receive #2)
    manager.list_leased().await.unwrap();
    // failure (receive #3)
    assert!(manager.drain().await.is_err());
    // success
    manager
        .resubmit(Some("r1".to_string()), "body".to_string())
        .await
        .unwrap();

    let opens = broker.log.opens.load(Ordering::SeqCst);
    assert_eq!(opens, 5);
    assert_eq!(broker.log.closes.load(Ordering::SeqCst), opens);
    assert_eq!(broker.inner.open_sessions(), 0);
}

#[tokio::test]
async fn test_unknown_queue_surfaces_broker_error() {
    let broker = recording(InMemoryBroker::default());
    let manager = manager(&broker, small_batches(10));

    let result = manager.list_messages().await;

    assert!(matches!(
        result,
        Err(AppError::Broker(BrokerError::EntityNotFound(_)))
    ));
}

#[tokio::test]
async fn test_concurrent_lock_holders_do_not_share_messages() {
    let inner = in_memory_broker();
    seed_numbered(&inner, 3);

    let mut first = inner.open_session(QUEUE).await.unwrap();
    let held = first
        .receive(SubQueue::DeadLetter, ReceiveMode::PeekLock, 2, Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(held.len(), 2);

    let broker = recording(inner);
    let manager = manager(&broker, small_batches(10));

    // m1 and m2 are locked by another consumer
    let completed = manager.complete_message("m3").await.unwrap().unwrap();
    assert_eq!(completed.message_id, "m3");
    assert!(manager.complete_message("m1").await.unwrap().is_none());

    first.close().await.unwrap();
}
