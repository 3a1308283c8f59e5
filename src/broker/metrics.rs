//! Prometheus metrics for dead-letter operations

use crate::broker::error::BrokerResult;
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::future::Future;
use std::time::Instant;

/// Dead-letter metrics
pub struct DlqMetrics {
    /// Messages returned by non-destructive peeks
    pub messages_peeked: CounterVec,

    /// Messages completed under peek-lock
    pub messages_completed: CounterVec,

    /// Messages removed by receive-and-delete
    pub messages_drained: CounterVec,

    /// Messages published back to the primary queue
    pub messages_resubmitted: CounterVec,

    /// Broker call failures
    pub broker_errors: CounterVec,

    /// Drains that failed after removing messages
    pub partial_drains: CounterVec,

    /// Open broker sessions
    pub active_sessions: GaugeVec,

    /// Broker call latency
    pub broker_latency: HistogramVec,
}

lazy_static! {
    pub static ref DLQ_METRICS: DlqMetrics = DlqMetrics {
        messages_peeked: register_counter_vec!(
            "dlq_messages_peeked_total",
            "Total number of dead-lettered messages returned by peek",
            &["queue"]
        )
        .unwrap(),

        messages_completed: register_counter_vec!(
            "dlq_messages_completed_total",
            "Total number of dead-lettered messages completed",
            &["queue"]
        )
        .unwrap(),

        messages_drained: register_counter_vec!(
            "dlq_messages_drained_total",
            "Total number of dead-lettered messages removed by drain",
            &["queue"]
        )
        .unwrap(),

        messages_resubmitted: register_counter_vec!(
            "dlq_messages_resubmitted_total",
            "Total number of messages resubmitted to the primary queue",
            &["queue"]
        )
        .unwrap(),

        broker_errors: register_counter_vec!(
            "dlq_broker_errors_total",
            "Total number of failed broker calls",
            &["operation", "error"]
        )
        .unwrap(),

        partial_drains: register_counter_vec!(
            "dlq_partial_drains_total",
            "Total number of drains that failed after removing messages",
            &["queue"]
        )
        .unwrap(),

        active_sessions: register_gauge_vec!(
            "dlq_active_broker_sessions",
            "Number of open broker sessions",
            &["backend"]
        )
        .unwrap(),

        broker_latency: register_histogram_vec!(
            "dlq_broker_operation_duration_seconds",
            "Broker call latency in seconds",
            &["operation"]
        )
        .unwrap(),
    };
}

/// Initialize dead-letter metrics
pub fn init_dlq_metrics() {
    lazy_static::initialize(&DLQ_METRICS);
}

/// Time a broker call and count its failure, if any
pub async fn observe_broker_call<T, F>(operation: &'static str, call: F) -> BrokerResult<T>
where
    F: Future<Output = BrokerResult<T>>,
{
    let start = Instant::now();
    let result = call.await;

    DLQ_METRICS
        .broker_latency
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    if let Err(ref e) = result {
        DLQ_METRICS
            .broker_errors
            .with_label_values(&[operation, e.kind()])
            .inc();
    }

    result
}

/// Render every registered metric in the text exposition format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}
