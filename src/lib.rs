//! Dead-letter queue management for broker-backed queues.
//!
//! Inspects, drains, completes and resubmits messages that a broker moved to
//! a queue's dead-letter sub-queue. The workflows live in [`dlq`], talk to the
//! broker only through [`broker::BrokerClient`], and are exposed over HTTP by
//! [`api`].
//!
//! ```no_run
//! use dlq_manager::broker::InMemoryBroker;
//! use dlq_manager::config::DlqConfig;
//! use dlq_manager::dlq::DeadLetterManager;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = InMemoryBroker::new(Duration::from_secs(30)).with_queue("orders");
//!     broker.dead_letter("orders", "m1", "payload", Some("MaxDeliveryCountExceeded"), None)?;
//!
//!     let manager = DeadLetterManager::new(Arc::new(broker), "orders", DlqConfig::default());
//!     for message in manager.list_messages().await? {
//!         println!("{} {}", message.sequence_number, message.message_id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod broker;
pub mod config;
pub mod dlq;
pub mod error;
pub mod models;

pub use error::{AppError, Result};
