//! Shared test fixtures: a broker wrapper that records calls and injects
//! receive failures.

#![allow(dead_code)]

use async_trait::async_trait;
use dlq_manager::broker::{BrokerClient, BrokerError, BrokerResult, BrokerSession, InMemoryBroker};
use dlq_manager::config::{CompleteSearch, DlqConfig};
use dlq_manager::dlq::DeadLetterManager;
use dlq_manager::models::{
    DeadLetteredMessage, LockToken, OutgoingMessage, ReceiveMode, ReceivedMessage, SubQueue,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const QUEUE: &str = "orders";

/// Calls observed across every session of a [`RecordingBroker`]
#[derive(Default)]
pub struct CallLog {
    pub peeks: Mutex<Vec<i64>>,
    pub receives: AtomicUsize,
    pub completes: AtomicUsize,
    pub abandons: AtomicUsize,
    pub sends: AtomicUsize,
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CallLog {
    pub fn peek_positions(&self) -> Vec<i64> {
        self.peeks.lock().unwrap().clone()
    }
}

/// Wraps an [`InMemoryBroker`], recording calls and optionally failing or
/// stalling the n-th receive (1-based, counted across sessions).
#[derive(Clone)]
pub struct RecordingBroker {
    pub inner: InMemoryBroker,
    pub log: Arc<CallLog>,
    fail_receive_at: Option<usize>,
    slow_receive_at: Option<(usize, Duration)>,
}

impl RecordingBroker {
    pub fn new(inner: InMemoryBroker) -> Self {
        Self {
            inner,
            log: Arc::new(CallLog::default()),
            fail_receive_at: None,
            slow_receive_at: None,
        }
    }

    pub fn failing_receive_at(mut self, call: usize) -> Self {
        self.fail_receive_at = Some(call);
        self
    }

    pub fn slow_receive_at(mut self, call: usize, delay: Duration) -> Self {
        self.slow_receive_at = Some((call, delay));
        self
    }
}

#[async_trait]
impl BrokerClient for RecordingBroker {
    async fn open_session(&self, queue: &str) -> BrokerResult<Box<dyn BrokerSession>> {
        let inner = self.inner.open_session(queue).await?;
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingSession {
            inner,
            log: self.log.clone(),
            fail_receive_at: self.fail_receive_at,
            slow_receive_at: self.slow_receive_at,
        }))
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingSession {
    inner: Box<dyn BrokerSession>,
    log: Arc<CallLog>,
    fail_receive_at: Option<usize>,
    slow_receive_at: Option<(usize, Duration)>,
}

#[async_trait]
impl BrokerSession for RecordingSession {
    async fn peek(
        &mut self,
        sub_queue: SubQueue,
        from_sequence: i64,
        max_count: usize,
    ) -> BrokerResult<Vec<DeadLetteredMessage>> {
        self.log.peeks.lock().unwrap().push(from_sequence);
        self.inner.peek(sub_queue, from_sequence, max_count).await
    }

    async fn receive(
        &mut self,
        sub_queue: SubQueue,
        mode: ReceiveMode,
        max_count: usize,
        max_wait: Duration,
    ) -> BrokerResult<Vec<ReceivedMessage>> {
        let call = self.log.receives.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_receive_at == Some(call) {
            return Err(BrokerError::ReceiveFailed("link detached".to_string()));
        }
        if let Some((slow, delay)) = self.slow_receive_at {
            if slow == call {
                tokio::time::sleep(delay).await;
            }
        }
        self.inner.receive(sub_queue, mode, max_count, max_wait).await
    }

    async fn complete(&mut self, lock: &LockToken) -> BrokerResult<()> {
        self.log.completes.fetch_add(1, Ordering::SeqCst);
        self.inner.complete(lock).await
    }

    async fn abandon(&mut self, lock: &LockToken) -> BrokerResult<()> {
        self.log.abandons.fetch_add(1, Ordering::SeqCst);
        self.inner.abandon(lock).await
    }

    async fn send(&mut self, message: OutgoingMessage) -> BrokerResult<String> {
        self.log.sends.fetch_add(1, Ordering::SeqCst);
        self.inner.send(message).await
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close().await
    }
}

/// Broker with the test queue declared and a one minute lock duration
pub fn in_memory_broker() -> InMemoryBroker {
    InMemoryBroker::new(Duration::from_secs(60)).with_queue(QUEUE)
}

/// Dead-letter `ids` in order, returning their sequence numbers
pub fn seed(broker: &InMemoryBroker, ids: &[&str]) -> Vec<i64> {
    ids.iter()
        .map(|id| {
            broker
                .dead_letter(QUEUE, *id, format!("body-{id}"), Some("MaxDeliveryCountExceeded"), None)
                .unwrap()
        })
        .collect()
}

/// Dead-letter `count` messages named `m1..=m<count>`
pub fn seed_numbered(broker: &InMemoryBroker, count: usize) -> Vec<i64> {
    let ids: Vec<String> = (1..=count).map(|i| format!("m{i}")).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    seed(broker, &refs)
}

/// Workflow tuning with small batches and no waiting
pub fn small_batches(batch_size: usize) -> DlqConfig {
    DlqConfig {
        peek_batch_size: batch_size,
        complete_batch_size: batch_size,
        complete_max_wait_secs: 0,
        complete_search: CompleteSearch::SingleBatch,
        drain_batch_size: batch_size,
        drain_max_wait_secs: 0,
        lease_batch_size: batch_size,
        lease_max_wait_secs: 0,
    }
}

pub fn manager(broker: &RecordingBroker, config: DlqConfig) -> DeadLetterManager {
    DeadLetterManager::new(Arc::new(broker.clone()), QUEUE, config)
}
