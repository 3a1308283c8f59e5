//! In-process broker with peek-lock semantics
//!
//! Backs local runs and the test suite. Each queue has a primary sub-queue and
//! a dead-letter sub-queue with independent, strictly increasing sequence
//! numbers. Locks expire after the configured lock duration. Receives never
//! block: an empty sub-queue yields an empty batch immediately, whatever the
//! requested wait time.

use crate::broker::error::{BrokerError, BrokerResult};
use crate::broker::metrics::DLQ_METRICS;
use crate::broker::traits::{BrokerClient, BrokerSession};
use crate::models::{
    DeadLetteredMessage, LockToken, OutgoingMessage, QueuedMessage, ReceiveMode, ReceivedMessage,
    SubQueue,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

const BACKEND: &str = "in_memory";

#[derive(Debug)]
struct Lock {
    token: LockToken,
    expires_at: Instant,
}

#[derive(Debug)]
struct StoredMessage {
    message: DeadLetteredMessage,
    lock: Option<Lock>,
}

impl StoredMessage {
    fn is_available(&self, now: Instant) -> bool {
        self.lock.as_ref().map_or(true, |lock| lock.expires_at <= now)
    }

    fn holds(&self, token: &LockToken, now: Instant) -> bool {
        self.lock
            .as_ref()
            .is_some_and(|lock| &lock.token == token && lock.expires_at > now)
    }
}

#[derive(Debug, Default)]
struct SubQueueState {
    last_sequence: i64,
    messages: BTreeMap<i64, StoredMessage>,
}

impl SubQueueState {
    fn append(&mut self, mut message: DeadLetteredMessage) -> i64 {
        self.last_sequence += 1;
        message.sequence_number = self.last_sequence;
        self.messages.insert(
            self.last_sequence,
            StoredMessage {
                message,
                lock: None,
            },
        );
        self.last_sequence
    }
}

#[derive(Debug, Default)]
struct QueueState {
    main: SubQueueState,
    dead_letter: SubQueueState,
    locks: LockIndex,
}

type Queues = Arc<Mutex<HashMap<String, QueueState>>>;
type LockIndex = HashMap<LockToken, (SubQueue, i64)>;

/// In-memory broker shared by every session it opens
#[derive(Clone)]
pub struct InMemoryBroker {
    queues: Queues,
    lock_duration: Duration,
    open_sessions: Arc<AtomicUsize>,
}

impl InMemoryBroker {
    /// Create a broker with no queues
    pub fn new(lock_duration: Duration) -> Self {
        Self {
            queues: Arc::new(Mutex::new(HashMap::new())),
            lock_duration,
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Declare a queue (and its dead-letter sub-queue)
    pub fn with_queue(self, queue: impl Into<String>) -> Self {
        self.create_queue(queue);
        self
    }

    /// Declare a queue if it does not exist yet
    pub fn create_queue(&self, queue: impl Into<String>) {
        self.queues.lock().entry(queue.into()).or_default();
    }

    /// Place a message directly on the dead-letter sub-queue, as the broker
    /// does after delivery failures. Returns the assigned sequence number.
    pub fn dead_letter(
        &self,
        queue: &str,
        message_id: impl Into<String>,
        body: impl Into<String>,
        reason: Option<&str>,
        description: Option<&str>,
    ) -> BrokerResult<i64> {
        let mut queues = self.queues.lock();
        let state = queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::EntityNotFound(queue.to_string()))?;

        Ok(state.dead_letter.append(DeadLetteredMessage {
            message_id: message_id.into(),
            body: body.into(),
            enqueued_at: Utc::now(),
            sequence_number: 0,
            dead_letter_reason: reason.map(str::to_string),
            dead_letter_description: description.map(str::to_string),
        }))
    }

    /// Number of messages currently in the dead-letter sub-queue, locked or not
    pub fn dead_letter_len(&self, queue: &str) -> usize {
        self.queues
            .lock()
            .get(queue)
            .map_or(0, |state| state.dead_letter.messages.len())
    }

    /// Snapshot of the primary queue
    pub fn main_queue(&self, queue: &str) -> Vec<QueuedMessage> {
        self.queues
            .lock()
            .get(queue)
            .map(|state| {
                state
                    .main
                    .messages
                    .values()
                    .map(|stored| QueuedMessage {
                        message_id: stored.message.message_id.clone(),
                        body: stored.message.body.clone(),
                        enqueued_at: stored.message.enqueued_at,
                        sequence_number: stored.message.sequence_number,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Sessions opened and not yet closed or dropped
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl BrokerClient for InMemoryBroker {
    async fn open_session(&self, queue: &str) -> BrokerResult<Box<dyn BrokerSession>> {
        if !self.queues.lock().contains_key(queue) {
            return Err(BrokerError::EntityNotFound(queue.to_string()));
        }

        self.open_sessions.fetch_add(1, Ordering::SeqCst);
        DLQ_METRICS
            .active_sessions
            .with_label_values(&[BACKEND])
            .inc();

        Ok(Box::new(InMemorySession {
            queues: self.queues.clone(),
            queue: queue.to_string(),
            lock_duration: self.lock_duration,
            open_sessions: self.open_sessions.clone(),
            closed: false,
        }))
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

/// Session over one queue of an [`InMemoryBroker`]
pub struct InMemorySession {
    queues: Queues,
    queue: String,
    lock_duration: Duration,
    open_sessions: Arc<AtomicUsize>,
    closed: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> BrokerResult<()> {
        if self.closed {
            Err(BrokerError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut QueueState) -> BrokerResult<T>,
    ) -> BrokerResult<T> {
        self.ensure_open()?;
        let mut queues = self.queues.lock();
        let state = queues
            .get_mut(&self.queue)
            .ok_or_else(|| BrokerError::EntityNotFound(self.queue.clone()))?;
        f(state)
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.open_sessions.fetch_sub(1, Ordering::SeqCst);
            DLQ_METRICS
                .active_sessions
                .with_label_values(&[BACKEND])
                .dec();
        }
    }
}

fn select(state: &mut QueueState, sub_queue: SubQueue) -> (&mut SubQueueState, &mut LockIndex) {
    let QueueState {
        main,
        dead_letter,
        locks,
    } = state;
    match sub_queue {
        SubQueue::Main => (main, locks),
        SubQueue::DeadLetter => (dead_letter, locks),
    }
}

#[async_trait]
impl BrokerSession for InMemorySession {
    async fn peek(
        &mut self,
        sub_queue: SubQueue,
        from_sequence: i64,
        max_count: usize,
    ) -> BrokerResult<Vec<DeadLetteredMessage>> {
        if max_count == 0 {
            return Err(BrokerError::InvalidRequest("max_count must be positive".to_string()));
        }

        self.with_state(|state| {
            let (sub, _) = select(state, sub_queue);
            Ok(sub
                .messages
                .range(from_sequence..)
                .take(max_count)
                .map(|(_, stored)| stored.message.clone())
                .collect())
        })
    }

    async fn receive(
        &mut self,
        sub_queue: SubQueue,
        mode: ReceiveMode,
        max_count: usize,
        _max_wait: Duration,
    ) -> BrokerResult<Vec<ReceivedMessage>> {
        if max_count == 0 {
            return Err(BrokerError::InvalidRequest("max_count must be positive".to_string()));
        }

        let lock_duration = self.lock_duration;
        self.with_state(|state| {
            let now = Instant::now();
            let (sub, locks) = select(state, sub_queue);

            match mode {
                ReceiveMode::PeekLock => {
                    let mut received = Vec::new();
                    for (sequence, stored) in sub.messages.iter_mut() {
                        if received.len() == max_count {
                            break;
                        }
                        if !stored.is_available(now) {
                            continue;
                        }
                        if let Some(expired) = stored.lock.take() {
                            locks.remove(&expired.token);
                        }

                        let token = LockToken::new(Uuid::new_v4().to_string());
                        stored.lock = Some(Lock {
                            token: token.clone(),
                            expires_at: now + lock_duration,
                        });
                        locks.insert(token.clone(), (sub_queue, *sequence));
                        received.push(ReceivedMessage::locked(stored.message.clone(), token));
                    }
                    Ok(received)
                }
                ReceiveMode::ReceiveAndDelete => {
                    let sequences: Vec<i64> = sub
                        .messages
                        .iter()
                        .filter(|(_, stored)| stored.is_available(now))
                        .map(|(sequence, _)| *sequence)
                        .take(max_count)
                        .collect();

                    let mut received = Vec::with_capacity(sequences.len());
                    for sequence in sequences {
                        if let Some(stored) = sub.messages.remove(&sequence) {
                            if let Some(expired) = stored.lock {
                                locks.remove(&expired.token);
                            }
                            received.push(ReceivedMessage::deleted(stored.message));
                        }
                    }
                    Ok(received)
                }
            }
        })
    }

    async fn complete(&mut self, lock: &LockToken) -> BrokerResult<()> {
        self.with_state(|state| {
            let now = Instant::now();
            let (sub_queue, sequence) = state
                .locks
                .remove(lock)
                .ok_or_else(|| BrokerError::LockLost(lock.to_string()))?;
            let (sub, _) = select(state, sub_queue);

            match sub.messages.get(&sequence) {
                Some(stored) if stored.holds(lock, now) => {
                    sub.messages.remove(&sequence);
                    Ok(())
                }
                _ => Err(BrokerError::LockLost(lock.to_string())),
            }
        })
    }

    async fn abandon(&mut self, lock: &LockToken) -> BrokerResult<()> {
        self.with_state(|state| {
            let now = Instant::now();
            let (sub_queue, sequence) = state
                .locks
                .remove(lock)
                .ok_or_else(|| BrokerError::LockLost(lock.to_string()))?;
            let (sub, _) = select(state, sub_queue);

            match sub.messages.get_mut(&sequence) {
                Some(stored) if stored.holds(lock, now) => {
                    stored.lock = None;
                    Ok(())
                }
                _ => Err(BrokerError::LockLost(lock.to_string())),
            }
        })
    }

    async fn send(&mut self, message: OutgoingMessage) -> BrokerResult<String> {
        self.with_state(|state| {
            let message_id = message
                .message_id
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

            state.main.append(DeadLetteredMessage {
                message_id: message_id.clone(),
                body: message.body,
                enqueued_at: Utc::now(),
                sequence_number: 0,
                dead_letter_reason: None,
                dead_letter_description: None,
            });
            Ok(message_id)
        })
    }

    async fn close(&mut self) -> BrokerResult<()> {
        self.ensure_open()?;
        self.release();
        Ok(())
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release();
    }
}
