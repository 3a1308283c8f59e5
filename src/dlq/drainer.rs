//! Destructive drain of the dead-letter sub-queue
//!
//! Every receive removes what it returns, so there is no cursor: the loop
//! keeps taking from the head until the broker hands back an empty batch.
//! Nothing here can be undone.

use crate::broker::{observe_broker_call, BrokerResult, BrokerSession};
use crate::dlq::batch::{collect_batches, BatchFailure, BatchSource};
use crate::models::{DrainedMessage, ReceiveMode, SubQueue};
use async_trait::async_trait;
use std::time::Duration;

/// Receive-and-delete source over the dead-letter sub-queue
pub struct DestructiveReceiver<'a> {
    session: &'a mut dyn BrokerSession,
    batch_size: usize,
    max_wait: Duration,
}

impl<'a> DestructiveReceiver<'a> {
    pub fn new(session: &'a mut dyn BrokerSession, batch_size: usize, max_wait: Duration) -> Self {
        Self {
            session,
            batch_size,
            max_wait,
        }
    }
}

#[async_trait]
impl<'a> BatchSource for DestructiveReceiver<'a> {
    type Item = DrainedMessage;

    async fn next_batch(&mut self) -> BrokerResult<Vec<DrainedMessage>> {
        let batch = observe_broker_call(
            "receive_and_delete",
            self.session.receive(
                SubQueue::DeadLetter,
                ReceiveMode::ReceiveAndDelete,
                self.batch_size,
                self.max_wait,
            ),
        )
        .await?;

        tracing::debug!(removed = batch.len(), "Received and deleted dead-letter batch");

        Ok(batch
            .into_iter()
            .map(|received| DrainedMessage::from(received.message))
            .collect())
    }
}

/// Remove every message from the dead-letter sub-queue.
///
/// On failure the returned [`BatchFailure`] lists the messages that were
/// already removed; they cannot be put back.
pub async fn drain_all(
    session: &mut dyn BrokerSession,
    batch_size: usize,
    max_wait: Duration,
) -> Result<Vec<DrainedMessage>, BatchFailure<DrainedMessage>> {
    let mut receiver = DestructiveReceiver::new(session, batch_size, max_wait);
    collect_batches(&mut receiver).await
}
