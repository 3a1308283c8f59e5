//! Error types for broker operations

use crate::error::AppError;

/// Result type for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

/// Errors reported by a broker client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    /// Connection or session establishment failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The queue (or sub-queue) does not exist on the broker
    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    /// The lock on a message expired or was never held
    #[error("Lock lost: {0}")]
    LockLost(String),

    /// Receive failed
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Send failed
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// The broker did not answer in time
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The request was rejected by the broker
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The broker answered in a way that breaks its own contract
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The session was already closed
    #[error("Session closed")]
    SessionClosed,
}

impl BrokerError {
    /// Short label used in metrics
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerError::ConnectionFailed(_) => "connection",
            BrokerError::EntityNotFound(_) => "entity_not_found",
            BrokerError::LockLost(_) => "lock_lost",
            BrokerError::ReceiveFailed(_) => "receive",
            BrokerError::SendFailed(_) => "send",
            BrokerError::Timeout(_) => "timeout",
            BrokerError::InvalidRequest(_) => "invalid_request",
            BrokerError::ProtocolViolation(_) => "protocol_violation",
            BrokerError::SessionClosed => "session_closed",
        }
    }
}

impl From<BrokerError> for AppError {
    fn from(err: BrokerError) -> Self {
        AppError::Broker(err)
    }
}
