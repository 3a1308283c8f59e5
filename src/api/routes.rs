use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
///
/// `request_timeout` applies to every route except the drain. A drain that is
/// cut off mid-loop would lose the messages it already removed.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let timed = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Dead-letter inspection
        .route("/v1/dlq/messages", get(handlers::list_messages))
        .route("/v1/dlq/messages/page", get(handlers::peek_page))
        .route("/v1/dlq/messages/leased", get(handlers::list_leased))
        // Dead-letter settlement
        .route("/v1/dlq/messages/complete", post(handlers::complete_message))
        // Redelivery
        .route("/v1/queue/resubmit", post(handlers::resubmit))
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/v1/dlq/drain", post(handlers::drain))
        .merge(timed)
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
