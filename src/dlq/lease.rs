//! Locked listing: receive one batch under peek-lock without settling it

use crate::broker::{observe_broker_call, BrokerResult, BrokerSession};
use crate::models::{LeasedMessage, ReceiveMode, SubQueue};
use std::time::Duration;

/// Lock up to `batch_size` messages and report them as pending.
///
/// Nothing is completed. The locks expire on their own, after which the
/// messages are receivable again; until then other consumers cannot see them.
pub async fn lease_batch(
    session: &mut dyn BrokerSession,
    batch_size: usize,
    max_wait: Duration,
) -> BrokerResult<Vec<LeasedMessage>> {
    let batch = observe_broker_call(
        "receive_locked",
        session.receive(SubQueue::DeadLetter, ReceiveMode::PeekLock, batch_size, max_wait),
    )
    .await?;

    Ok(batch
        .into_iter()
        .map(|received| LeasedMessage::from(received.message))
        .collect())
}
