pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::dlq::DeadLetterManager;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<DeadLetterManager>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(manager: Arc<DeadLetterManager>) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
        }
    }
}
