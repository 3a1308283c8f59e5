use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Broker connection configuration
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Dead-letter workflow tuning
    #[serde(default)]
    pub dlq: DlqConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path = std::env::var("DLQ_MANAGER_CONFIG")
            .unwrap_or_else(|_| "config/dlq-manager.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration, overriding the embedded defaults with `path` (if
    /// it exists) and `DLQ_MANAGER__*` environment variables
    pub fn load_from(path: &str) -> std::result::Result<Self, config::ConfigError> {
        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(path).required(false))
            // Override with environment variables (prefix: DLQ_MANAGER__)
            .add_source(
                config::Environment::with_prefix("DLQ_MANAGER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject values the workflows cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.broker.queue_name.trim().is_empty() {
            return Err(AppError::Configuration(
                "broker.queue_name must not be empty".to_string(),
            ));
        }

        let batch_sizes = [
            ("dlq.peek_batch_size", self.dlq.peek_batch_size),
            ("dlq.complete_batch_size", self.dlq.complete_batch_size),
            ("dlq.drain_batch_size", self.dlq.drain_batch_size),
            ("dlq.lease_batch_size", self.dlq.lease_batch_size),
        ];
        for (name, value) in batch_sizes {
            if value == 0 {
                return Err(AppError::Configuration(format!("{name} must be positive")));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BrokerBackend {
    #[default]
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker backend
    #[serde(default)]
    pub backend: BrokerBackend,

    /// Broker connection endpoint / connection string
    pub connection_string: Option<String>,

    /// Primary queue whose dead-letter sub-queue is managed
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Peek-lock duration granted by the broker (seconds)
    #[serde(default = "default_lock_duration")]
    pub lock_duration_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BrokerBackend::default(),
            connection_string: None,
            queue_name: default_queue_name(),
            lock_duration_secs: default_lock_duration(),
        }
    }
}

/// How far the targeted completion searches for its message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompleteSearch {
    /// One locked batch; non-matching locks are left to expire
    #[default]
    SingleBatch,
    /// Locked batches until found or empty; non-matching locks are abandoned
    Exhaustive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqConfig {
    /// Messages per peek round-trip
    #[serde(default = "default_peek_batch_size")]
    pub peek_batch_size: usize,

    /// Messages per locked receive when completing by identifier
    #[serde(default = "default_complete_batch_size")]
    pub complete_batch_size: usize,

    /// Max wait for a locked receive when completing (seconds)
    #[serde(default = "default_complete_max_wait")]
    pub complete_max_wait_secs: u64,

    /// Search scope for completion by identifier
    #[serde(default)]
    pub complete_search: CompleteSearch,

    /// Messages per receive-and-delete round-trip
    #[serde(default = "default_drain_batch_size")]
    pub drain_batch_size: usize,

    /// Max wait for each drain receive (seconds)
    #[serde(default = "default_drain_max_wait")]
    pub drain_max_wait_secs: u64,

    /// Messages per locked receive when listing leased messages
    #[serde(default = "default_lease_batch_size")]
    pub lease_batch_size: usize,

    /// Max wait for the leased listing receive (seconds)
    #[serde(default = "default_lease_max_wait")]
    pub lease_max_wait_secs: u64,
}

impl DlqConfig {
    pub fn complete_max_wait(&self) -> Duration {
        Duration::from_secs(self.complete_max_wait_secs)
    }

    pub fn drain_max_wait(&self) -> Duration {
        Duration::from_secs(self.drain_max_wait_secs)
    }

    pub fn lease_max_wait(&self) -> Duration {
        Duration::from_secs(self.lease_max_wait_secs)
    }
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            peek_batch_size: default_peek_batch_size(),
            complete_batch_size: default_complete_batch_size(),
            complete_max_wait_secs: default_complete_max_wait(),
            complete_search: CompleteSearch::default(),
            drain_batch_size: default_drain_batch_size(),
            drain_max_wait_secs: default_drain_max_wait(),
            lease_batch_size: default_lease_batch_size(),
            lease_max_wait_secs: default_lease_max_wait(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

fn default_queue_name() -> String {
    "orders".to_string()
}

fn default_lock_duration() -> u64 {
    60
}

fn default_peek_batch_size() -> usize {
    50
}

fn default_complete_batch_size() -> usize {
    10
}

fn default_complete_max_wait() -> u64 {
    5
}

fn default_drain_batch_size() -> usize {
    50
}

fn default_drain_max_wait() -> u64 {
    10
}

fn default_lease_batch_size() -> usize {
    50
}

fn default_lease_max_wait() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "dlq-manager".to_string()
}

fn default_true() -> bool {
    true
}
