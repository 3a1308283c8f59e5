//! Non-destructive listing of the dead-letter sub-queue
//!
//! Paging follows the broker's sequence numbers: each peek starts one past
//! the last position seen, so no message is returned twice. The listing is a
//! best-effort snapshot. Messages dead-lettered while paging is in progress
//! may or may not appear, and messages removed by a concurrent consumer may
//! still be listed.

use crate::broker::{observe_broker_call, BrokerError, BrokerResult, BrokerSession};
use crate::dlq::batch::{collect_batches, BatchSource};
use crate::models::{DeadLetteredMessage, SubQueue, MIN_SEQUENCE_NUMBER};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Cursor over the dead-letter sub-queue driven by sequence numbers
pub struct PeekCursor<'a> {
    session: &'a mut dyn BrokerSession,
    next_from: i64,
    batch_size: usize,
}

impl<'a> PeekCursor<'a> {
    pub fn new(session: &'a mut dyn BrokerSession, from_sequence: i64, batch_size: usize) -> Self {
        Self {
            session,
            next_from: from_sequence,
            batch_size,
        }
    }

    /// Position the next peek will start from
    pub fn position(&self) -> i64 {
        self.next_from
    }
}

#[async_trait]
impl<'a> BatchSource for PeekCursor<'a> {
    type Item = DeadLetteredMessage;

    async fn next_batch(&mut self) -> BrokerResult<Vec<DeadLetteredMessage>> {
        let batch = observe_broker_call(
            "peek",
            self.session
                .peek(SubQueue::DeadLetter, self.next_from, self.batch_size),
        )
        .await?;

        tracing::debug!(
            from_sequence = self.next_from,
            returned = batch.len(),
            "Peeked dead-letter batch"
        );

        let mut floor = self.next_from;
        for message in &batch {
            if message.sequence_number < floor {
                return Err(BrokerError::ProtocolViolation(format!(
                    "peek from {} returned out-of-order sequence number {}",
                    self.next_from, message.sequence_number
                )));
            }
            floor = message.sequence_number + 1;
        }
        self.next_from = floor;

        Ok(batch)
    }

    fn is_exhausted_by(&self, len: usize) -> bool {
        len < self.batch_size
    }
}

/// List every message in the dead-letter sub-queue in ascending sequence
/// order. An empty sub-queue yields an empty vector.
pub async fn peek_all(
    session: &mut dyn BrokerSession,
    batch_size: usize,
) -> BrokerResult<Vec<DeadLetteredMessage>> {
    let mut cursor = PeekCursor::new(session, MIN_SEQUENCE_NUMBER, batch_size);

    // Peeks are harmless to repeat, so a partial listing is simply dropped.
    collect_batches(&mut cursor)
        .await
        .map_err(|failure| failure.error)
}

/// One page of a cursor-driven listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<DeadLetteredMessage>,

    /// Where the following page starts; `None` once the sub-queue is exhausted
    pub next_sequence: Option<i64>,
}

/// Peek a single page of at most `limit` messages starting at `from_sequence`
pub async fn peek_page(
    session: &mut dyn BrokerSession,
    from_sequence: i64,
    limit: usize,
) -> BrokerResult<MessagePage> {
    let mut cursor = PeekCursor::new(session, from_sequence, limit);
    let messages = cursor.next_batch().await?;

    let next_sequence = if cursor.is_exhausted_by(messages.len()) {
        None
    } else {
        Some(cursor.position())
    };

    Ok(MessagePage {
        messages,
        next_sequence,
    })
}
