//! Broker client abstractions

use crate::broker::error::BrokerResult;
use crate::models::{
    DeadLetteredMessage, LockToken, OutgoingMessage, ReceiveMode, ReceivedMessage, SubQueue,
};
use async_trait::async_trait;
use std::time::Duration;

/// Connection-level broker client.
///
/// Opens one [`BrokerSession`] per workflow invocation. Implementations own
/// connection establishment, wire protocol and any transport-level retries.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Open a session bound to `queue`
    async fn open_session(&self, queue: &str) -> BrokerResult<Box<dyn BrokerSession>>;

    /// Backend name for logs and metrics
    fn backend_name(&self) -> &'static str;
}

/// A session scoped to a single queue and a single workflow invocation.
///
/// Callers must invoke [`BrokerSession::close`] on every exit path.
#[async_trait]
pub trait BrokerSession: Send {
    /// Browse messages without touching their delivery state
    async fn peek(
        &mut self,
        sub_queue: SubQueue,
        from_sequence: i64,
        max_count: usize,
    ) -> BrokerResult<Vec<DeadLetteredMessage>>;

    /// Fetch messages. Under [`ReceiveMode::PeekLock`] every returned message
    /// carries a lock token; under [`ReceiveMode::ReceiveAndDelete`] the
    /// messages are already gone from the broker.
    async fn receive(
        &mut self,
        sub_queue: SubQueue,
        mode: ReceiveMode,
        max_count: usize,
        max_wait: Duration,
    ) -> BrokerResult<Vec<ReceivedMessage>>;

    /// Settle a locked message, removing it from its sub-queue
    async fn complete(&mut self, lock: &LockToken) -> BrokerResult<()>;

    /// Release a lock early so the message is immediately receivable again
    async fn abandon(&mut self, lock: &LockToken) -> BrokerResult<()>;

    /// Publish a new message onto the session's primary queue.
    ///
    /// Returns the identifier the message was sent with.
    async fn send(&mut self, message: OutgoingMessage) -> BrokerResult<String>;

    /// Release the session
    async fn close(&mut self) -> BrokerResult<()>;
}
