//! Redelivery of a dead-lettered payload onto the primary queue

use crate::broker::{observe_broker_call, BrokerResult, BrokerSession};
use crate::error::{AppError, Result};
use crate::models::OutgoingMessage;
use serde::{Deserialize, Serialize};

/// Acknowledgment of a resubmission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResubmittedMessage {
    /// Identifier the new message carries
    pub message_id: String,

    /// Queue the message was published to
    pub queue: String,

    pub status: String,
}

/// Check a resubmission before any broker call is made
pub fn validate(message: &OutgoingMessage) -> Result<()> {
    if message.body.is_empty() {
        return Err(AppError::Validation(
            "body is required and must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Publish `message` once onto the session's primary queue.
///
/// The dead-lettered original is left in place; clearing it is a separate
/// completion or drain.
pub async fn resubmit(
    session: &mut dyn BrokerSession,
    message: OutgoingMessage,
) -> BrokerResult<String> {
    observe_broker_call("send", session.send(message)).await
}
