//! Targeted completion of a dead-lettered message by identifier
//!
//! Messages are received under peek-lock and the first one whose identifier
//! matches (in received order) is completed. Everything else received along
//! the way is never completed. With [`CompleteSearch::SingleBatch`] only one
//! batch is searched and the other locks are left to expire; with
//! [`CompleteSearch::Exhaustive`] batches are received until the target turns
//! up, the sub-queue runs dry or an already received message comes around
//! again, and every other lock is abandoned afterwards.

use crate::broker::{observe_broker_call, BrokerError, BrokerResult, BrokerSession};
use crate::config::CompleteSearch;
use crate::models::{
    CompletedMessage, LockToken, MessageStatus, ReceiveMode, ReceivedMessage, SubQueue,
};
use std::collections::HashSet;
use std::time::Duration;

/// Search parameters for a targeted completion
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub search: CompleteSearch,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// Complete the first dead-lettered message whose identifier equals
/// `message_id`. Returns `Ok(None)` when no such message was received.
pub async fn complete_by_id(
    session: &mut dyn BrokerSession,
    message_id: &str,
    options: ResolveOptions,
) -> BrokerResult<Option<CompletedMessage>> {
    let batch_limit = match options.search {
        CompleteSearch::SingleBatch => Some(1),
        CompleteSearch::Exhaustive => None,
    };

    let mut passed_over = Vec::new();
    let outcome = match locate(session, message_id, options, batch_limit, &mut passed_over).await {
        Ok(Some(target)) => settle(session, target).await.map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };

    match options.search {
        CompleteSearch::Exhaustive => abandon_all(session, &passed_over).await,
        CompleteSearch::SingleBatch if !passed_over.is_empty() => {
            tracing::debug!(
                count = passed_over.len(),
                "Leaving non-matching locks to expire"
            );
        }
        CompleteSearch::SingleBatch => {}
    }

    outcome
}

/// Receive locked batches until the target shows up, the sub-queue is empty,
/// a message comes around a second time or `batch_limit` batches were
/// searched. A repeat means an earlier lock expired mid-search; the search
/// ends there instead of circling. Locks of every non-matching message,
/// including later duplicates of the target, land in `passed_over`.
async fn locate(
    session: &mut dyn BrokerSession,
    message_id: &str,
    options: ResolveOptions,
    batch_limit: Option<usize>,
    passed_over: &mut Vec<LockToken>,
) -> BrokerResult<Option<ReceivedMessage>> {
    let mut batches = 0usize;
    let mut seen = HashSet::new();

    loop {
        let batch = observe_broker_call(
            "receive_locked",
            session.receive(
                SubQueue::DeadLetter,
                ReceiveMode::PeekLock,
                options.batch_size,
                options.max_wait,
            ),
        )
        .await?;
        batches += 1;

        if batch.is_empty() {
            return Ok(None);
        }

        let mut target = None;
        let mut wrapped = false;
        for received in batch {
            let first_sighting = seen.insert(received.message.sequence_number);
            wrapped |= !first_sighting;

            if target.is_none() && first_sighting && received.message.message_id == message_id {
                target = Some(received);
            } else if let Some(lock) = received.lock {
                passed_over.push(lock);
            }
        }

        if target.is_some() {
            return Ok(target);
        }

        if wrapped {
            tracing::debug!(
                batches,
                seen = seen.len(),
                "Search wrapped around to already received messages"
            );
            return Ok(None);
        }

        if batch_limit.is_some_and(|limit| batches >= limit) {
            return Ok(None);
        }

        tokio::task::yield_now().await;
    }
}

async fn settle(
    session: &mut dyn BrokerSession,
    target: ReceivedMessage,
) -> BrokerResult<CompletedMessage> {
    let lock = target.lock.ok_or_else(|| {
        BrokerError::ProtocolViolation(format!(
            "peek-lock receive returned message {} without a lock",
            target.message.message_id
        ))
    })?;

    observe_broker_call("complete", session.complete(&lock)).await?;

    tracing::info!(
        message_id = %target.message.message_id,
        sequence_number = target.message.sequence_number,
        "Completed dead-lettered message"
    );

    Ok(CompletedMessage {
        message_id: target.message.message_id,
        status: MessageStatus::Processed,
    })
}

/// Abandon failures only delay redelivery until the lock expires, so they are
/// logged rather than reported.
async fn abandon_all(session: &mut dyn BrokerSession, locks: &[LockToken]) {
    for lock in locks {
        if let Err(e) = observe_broker_call("abandon", session.abandon(lock)).await {
            tracing::warn!(lock = %lock, error = %e, "Failed to abandon locked message");
        }
    }

    if !locks.is_empty() {
        tracing::debug!(count = locks.len(), "Abandoned non-matching locks");
    }
}
