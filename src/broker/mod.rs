//! Broker client capability
//!
//! The dead-letter workflows only ever talk to a broker through
//! [`BrokerClient`] and the per-invocation [`BrokerSession`] it opens:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │   Dead-letter workflows (dlq module)         │
//! └──────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────────┐
//! │   BrokerClient::open_session(queue)          │
//! ├──────────────────────────────────────────────┤
//! │  - peek()      - receive(mode)               │
//! │  - complete()  - abandon()                   │
//! │  - send()      - close()                     │
//! └──────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌──────────────────────────────────────────────┐
//! │   InMemoryBroker (local runs and tests)      │
//! └──────────────────────────────────────────────┘
//! ```

mod error;
mod memory;
mod metrics;
mod traits;

pub use error::{BrokerError, BrokerResult};
pub use memory::{InMemoryBroker, InMemorySession};
pub use metrics::{gather_metrics, init_dlq_metrics, observe_broker_call, DLQ_METRICS};
pub use traits::{BrokerClient, BrokerSession};

use crate::config::{BrokerBackend, BrokerConfig};
use crate::error::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;

/// Create a broker client based on configuration
pub fn create_broker(config: &BrokerConfig) -> Result<Arc<dyn BrokerClient>> {
    if config.queue_name.trim().is_empty() {
        return Err(AppError::Configuration(
            "Broker requires a non-empty 'queue_name'".to_string(),
        ));
    }

    match config.backend {
        BrokerBackend::InMemory => {
            if let Some(endpoint) = config.connection_string.as_deref() {
                tracing::warn!(
                    endpoint = %redact_connection_string(endpoint),
                    "connection_string is ignored by the in-memory broker"
                );
            }

            tracing::info!(
                queue = %config.queue_name,
                lock_duration_secs = config.lock_duration_secs,
                "Initializing in-memory broker"
            );

            let broker = InMemoryBroker::new(Duration::from_secs(config.lock_duration_secs))
                .with_queue(config.queue_name.clone());
            Ok(Arc::new(broker))
        }
    }
}

/// Keep the endpoint of a `Key=Value;...` connection string and drop every
/// other component, secrets included
fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .split(';')
        .find_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("endpoint")
                .then(|| format!("Endpoint={};<redacted>", value.trim()))
        })
        .unwrap_or_else(|| "<redacted>".to_string())
}
