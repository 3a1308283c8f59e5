use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Sequence number the broker never assigns below; paging starts here.
pub const MIN_SEQUENCE_NUMBER: i64 = 0;

/// A message that the broker moved to the dead-letter sub-queue.
///
/// `message_id` is whatever the producer set at send time and is not
/// guaranteed to be unique. `sequence_number` is assigned by the broker
/// and is strictly increasing within the sub-queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetteredMessage {
    /// Producer-assigned identifier
    pub message_id: String,

    /// Raw payload
    pub body: String,

    /// Original enqueue time
    pub enqueued_at: DateTime<Utc>,

    /// Broker-assigned position within the sub-queue
    pub sequence_number: i64,

    /// Reason recorded by the broker when dead-lettering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_reason: Option<String>,

    /// Free-form description recorded by the broker when dead-lettering
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dead_letter_description: Option<String>,
}

/// Outcome marker attached to messages returned by destructive or locking reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum MessageStatus {
    /// Locked but not acknowledged; the lock will expire
    Pending,
    /// Removed from the sub-queue
    Processed,
}

/// How a receive call treats the messages it hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum ReceiveMode {
    /// Messages are locked and must be completed (or left to expire)
    PeekLock,
    /// Messages are removed as soon as they are received
    ReceiveAndDelete,
}

/// Which sub-queue of an entity an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubQueue {
    /// The live queue
    Main,
    /// The `$DeadLetterQueue` sub-queue
    DeadLetter,
}

/// Opaque lock handle returned by a peek-lock receive.
///
/// Never serialized to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A message handed out by a receive call, with its lock when received under peek-lock
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub message: DeadLetteredMessage,
    pub lock: Option<LockToken>,
}

impl ReceivedMessage {
    pub fn locked(message: DeadLetteredMessage, lock: LockToken) -> Self {
        Self {
            message,
            lock: Some(lock),
        }
    }

    pub fn deleted(message: DeadLetteredMessage) -> Self {
        Self {
            message,
            lock: None,
        }
    }
}

/// Manifest entry for a message removed by a drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainedMessage {
    #[serde(flatten)]
    pub message: DeadLetteredMessage,
    pub status: MessageStatus,
    pub mode: ReceiveMode,
}

impl From<DeadLetteredMessage> for DrainedMessage {
    fn from(message: DeadLetteredMessage) -> Self {
        Self {
            message,
            status: MessageStatus::Processed,
            mode: ReceiveMode::ReceiveAndDelete,
        }
    }
}

/// A message currently held under a peek-lock that nobody will complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeasedMessage {
    #[serde(flatten)]
    pub message: DeadLetteredMessage,
    pub status: MessageStatus,
    pub mode: ReceiveMode,
}

impl From<DeadLetteredMessage> for LeasedMessage {
    fn from(message: DeadLetteredMessage) -> Self {
        Self {
            message,
            status: MessageStatus::Pending,
            mode: ReceiveMode::PeekLock,
        }
    }
}

/// Result of a targeted completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedMessage {
    pub message_id: String,
    pub status: MessageStatus,
}

/// A new message to publish onto the primary queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Identifier to carry over; the broker assigns one when absent
    pub message_id: Option<String>,
    pub body: String,
}

impl OutgoingMessage {
    pub fn new(message_id: Option<String>, body: impl Into<String>) -> Self {
        Self {
            message_id,
            body: body.into(),
        }
    }
}

/// A message sitting on the primary queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub message_id: String,
    pub body: String,
    pub enqueued_at: DateTime<Utc>,
    pub sequence_number: i64,
}
