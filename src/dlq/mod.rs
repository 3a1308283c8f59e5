//! Dead-letter queue workflows
//!
//! Every workflow is an independent entry point on [`DeadLetterManager`]. Each
//! invocation opens its own broker session, runs its broker calls strictly in
//! sequence and closes the session on every exit path. The broker is the only
//! synchronization point between concurrent invocations.
//!
//! | Workflow            | Broker calls                         | Destructive |
//! |---------------------|--------------------------------------|-------------|
//! | `list_messages`     | peek, cursor advanced per batch      | no          |
//! | `peek_page`         | one peek                             | no          |
//! | `list_leased`       | one peek-lock receive                | no (locks)  |
//! | `complete_message`  | peek-lock receive(s), one complete   | one message |
//! | `drain`             | receive-and-delete until empty       | yes         |
//! | `resubmit`          | one send to the primary queue        | no          |

pub mod batch;
pub mod drainer;
pub mod lease;
pub mod pager;
pub mod resolver;
pub mod resubmitter;

pub use pager::MessagePage;
pub use resolver::ResolveOptions;
pub use resubmitter::ResubmittedMessage;

use crate::broker::{observe_broker_call, BrokerClient, BrokerSession, DLQ_METRICS};
use crate::config::DlqConfig;
use crate::error::{AppError, Result};
use crate::models::{
    CompletedMessage, DeadLetteredMessage, DrainedMessage, LeasedMessage, OutgoingMessage,
};
use std::sync::Arc;

/// Largest page a single peek request may ask for
pub const MAX_PAGE_SIZE: usize = 250;

/// Entry point for all dead-letter workflows against one queue
#[derive(Clone)]
pub struct DeadLetterManager {
    broker: Arc<dyn BrokerClient>,
    queue: String,
    config: DlqConfig,
}

impl DeadLetterManager {
    pub fn new(broker: Arc<dyn BrokerClient>, queue: impl Into<String>, config: DlqConfig) -> Self {
        Self {
            broker,
            queue: queue.into(),
            config,
        }
    }

    /// Primary queue whose dead-letter sub-queue is managed
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn config(&self) -> &DlqConfig {
        &self.config
    }

    async fn open(&self) -> Result<Box<dyn BrokerSession>> {
        let session =
            observe_broker_call("open_session", self.broker.open_session(&self.queue)).await?;
        Ok(session)
    }

    /// The workflow outcome is already decided when this runs, so a failing
    /// close is logged instead of replacing it.
    async fn close(&self, mut session: Box<dyn BrokerSession>) {
        if let Err(e) = observe_broker_call("close_session", session.close()).await {
            tracing::warn!(queue = %self.queue, error = %e, "Failed to close broker session");
        }
    }

    /// List every dead-lettered message in ascending sequence order without
    /// changing any delivery state.
    ///
    /// The result is a best-effort snapshot, not a transactional read:
    /// messages dead-lettered while the listing runs may or may not appear.
    /// An empty vector means the sub-queue held nothing.
    pub async fn list_messages(&self) -> Result<Vec<DeadLetteredMessage>> {
        let mut session = self.open().await?;
        let result = pager::peek_all(session.as_mut(), self.config.peek_batch_size).await;
        self.close(session).await;

        let messages = result?;
        DLQ_METRICS
            .messages_peeked
            .with_label_values(&[self.queue.as_str()])
            .inc_by(messages.len() as f64);

        tracing::info!(queue = %self.queue, count = messages.len(), "Listed dead-lettered messages");
        Ok(messages)
    }

    /// Peek one page starting at `from_sequence`. `limit` defaults to the
    /// configured peek batch size and is clamped to `1..=MAX_PAGE_SIZE`.
    pub async fn peek_page(&self, from_sequence: i64, limit: Option<usize>) -> Result<MessagePage> {
        let limit = limit
            .unwrap_or(self.config.peek_batch_size)
            .clamp(1, MAX_PAGE_SIZE);

        let mut session = self.open().await?;
        let result = pager::peek_page(session.as_mut(), from_sequence, limit).await;
        self.close(session).await;

        let page = result?;
        DLQ_METRICS
            .messages_peeked
            .with_label_values(&[self.queue.as_str()])
            .inc_by(page.messages.len() as f64);

        tracing::debug!(
            queue = %self.queue,
            from_sequence,
            count = page.messages.len(),
            next_sequence = ?page.next_sequence,
            "Peeked dead-letter page"
        );
        Ok(page)
    }

    /// Lock one batch and report it as pending. Locks are left to expire.
    pub async fn list_leased(&self) -> Result<Vec<LeasedMessage>> {
        let mut session = self.open().await?;
        let result = lease::lease_batch(
            session.as_mut(),
            self.config.lease_batch_size,
            self.config.lease_max_wait(),
        )
        .await;
        self.close(session).await;

        let messages = result?;
        tracing::info!(queue = %self.queue, count = messages.len(), "Leased dead-lettered messages");
        Ok(messages)
    }

    /// Complete the first dead-lettered message carrying `message_id`.
    ///
    /// Identifiers are not unique: only the first match in received order is
    /// completed and later duplicates are left untouched. `Ok(None)` means no
    /// match was received, which is distinct from a broker failure.
    pub async fn complete_message(&self, message_id: &str) -> Result<Option<CompletedMessage>> {
        if message_id.trim().is_empty() {
            return Err(AppError::Validation("message_id is required".to_string()));
        }

        let options = ResolveOptions {
            search: self.config.complete_search,
            batch_size: self.config.complete_batch_size,
            max_wait: self.config.complete_max_wait(),
        };

        let mut session = self.open().await?;
        let result = resolver::complete_by_id(session.as_mut(), message_id, options).await;
        self.close(session).await;

        let completed = result?;
        match &completed {
            Some(message) => {
                DLQ_METRICS
                    .messages_completed
                    .with_label_values(&[self.queue.as_str()])
                    .inc();
                tracing::info!(queue = %self.queue, message_id = %message.message_id, "Message completed");
            }
            None => {
                tracing::info!(queue = %self.queue, message_id = %message_id, "No dead-lettered message matched");
            }
        }
        Ok(completed)
    }

    /// Remove every dead-lettered message and return the manifest.
    ///
    /// Not undoable. If the broker fails after some messages were removed the
    /// error is [`AppError::PartialDrain`], which carries those messages.
    pub async fn drain(&self) -> Result<Vec<DrainedMessage>> {
        let mut session = self.open().await?;
        let result = drainer::drain_all(
            session.as_mut(),
            self.config.drain_batch_size,
            self.config.drain_max_wait(),
        )
        .await;
        self.close(session).await;

        match result {
            Ok(manifest) => {
                DLQ_METRICS
                    .messages_drained
                    .with_label_values(&[self.queue.as_str()])
                    .inc_by(manifest.len() as f64);
                if !manifest.is_empty() {
                    let drained_ids: Vec<&str> = manifest
                        .iter()
                        .map(|m| m.message.message_id.as_str())
                        .collect();
                    tracing::warn!(
                        queue = %self.queue,
                        count = manifest.len(),
                        drained_ids = ?drained_ids,
                        "Drained dead-letter sub-queue"
                    );
                }
                Ok(manifest)
            }
            Err(failure) if failure.collected.is_empty() => Err(failure.error.into()),
            Err(failure) => {
                let removed = failure.collected;
                let removed_ids: Vec<&str> = removed
                    .iter()
                    .map(|m| m.message.message_id.as_str())
                    .collect();

                DLQ_METRICS
                    .messages_drained
                    .with_label_values(&[self.queue.as_str()])
                    .inc_by(removed.len() as f64);
                DLQ_METRICS
                    .partial_drains
                    .with_label_values(&[self.queue.as_str()])
                    .inc();
                tracing::error!(
                    queue = %self.queue,
                    removed = removed.len(),
                    removed_ids = ?removed_ids,
                    error = %failure.error,
                    "Drain failed after removing messages; they must be recovered from the manifest"
                );

                Err(AppError::PartialDrain {
                    removed,
                    source: failure.error,
                })
            }
        }
    }

    /// Publish a new message carrying `message_id` and `body` onto the primary
    /// queue. The dead-lettered original is not touched.
    pub async fn resubmit(
        &self,
        message_id: Option<String>,
        body: String,
    ) -> Result<ResubmittedMessage> {
        let message = OutgoingMessage::new(message_id, body);
        resubmitter::validate(&message)?;

        let mut session = self.open().await?;
        let result = resubmitter::resubmit(session.as_mut(), message).await;
        self.close(session).await;

        let message_id = result?;
        DLQ_METRICS
            .messages_resubmitted
            .with_label_values(&[self.queue.as_str()])
            .inc();
        tracing::info!(queue = %self.queue, message_id = %message_id, "Resubmitted message to primary queue");

        Ok(ResubmittedMessage {
            message_id,
            queue: self.queue.clone(),
            status: "Resubmitted".to_string(),
        })
    }
}
