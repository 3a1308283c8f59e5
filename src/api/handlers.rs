use crate::api::AppState;
use crate::dlq::{MessagePage, ResubmittedMessage};
use crate::error::{AppError, Result};
use crate::models::{CompletedMessage, DeadLetteredMessage, DrainedMessage, LeasedMessage};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

const EMPTY_DLQ: &str = "No messages found in DLQ.";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        queue: state.manager.queue().to_string(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: String,
}

/// List every dead-lettered message
pub async fn list_messages(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeadLetteredMessage>>> {
    let messages = state.manager.list_messages().await?;
    if messages.is_empty() {
        return Err(AppError::NotFound(EMPTY_DLQ.to_string()));
    }
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct PeekPageQuery {
    pub from_sequence: Option<i64>,
    pub limit: Option<usize>,
}

/// Peek a single page of dead-lettered messages
pub async fn peek_page(
    State(state): State<AppState>,
    Query(params): Query<PeekPageQuery>,
) -> Result<Json<MessagePage>> {
    let from_sequence = params.from_sequence.unwrap_or(crate::models::MIN_SEQUENCE_NUMBER);
    if from_sequence < 0 {
        return Err(AppError::Validation(
            "from_sequence must not be negative".to_string(),
        ));
    }

    let page = state.manager.peek_page(from_sequence, params.limit).await?;
    if page.messages.is_empty() {
        return Err(AppError::NotFound(EMPTY_DLQ.to_string()));
    }
    Ok(Json(page))
}

/// Lock a batch of dead-lettered messages without completing them
pub async fn list_leased(State(state): State<AppState>) -> Result<Json<Vec<LeasedMessage>>> {
    let messages = state.manager.list_leased().await?;
    if messages.is_empty() {
        return Err(AppError::NotFound(EMPTY_DLQ.to_string()));
    }
    Ok(Json(messages))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteMessageRequest {
    #[serde(default, alias = "identifier", alias = "MessageId")]
    #[validate(length(min = 1, message = "message_id is required"))]
    pub message_id: String,
}

/// Complete a dead-lettered message by identifier
pub async fn complete_message(
    State(state): State<AppState>,
    Json(request): Json<CompleteMessageRequest>,
) -> Result<Json<CompletedMessage>> {
    request.validate()?;

    let completed = state
        .manager
        .complete_message(&request.message_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Message with ID {} not found.", request.message_id))
        })?;

    Ok(Json(completed))
}

/// Remove every dead-lettered message
///
/// The drain runs as its own task, so a dropped connection cannot stop it
/// between a receive and the manifest being recorded.
pub async fn drain(State(state): State<AppState>) -> Result<Json<Vec<DrainedMessage>>> {
    let manager = state.manager.clone();
    let manifest = tokio::spawn(async move { manager.drain().await }).await??;
    if manifest.is_empty() {
        return Err(AppError::NotFound(EMPTY_DLQ.to_string()));
    }
    Ok(Json(manifest))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResubmitRequest {
    #[serde(default, alias = "identifier", alias = "MessageId")]
    pub message_id: Option<String>,

    #[serde(default, alias = "Body")]
    #[validate(length(min = 1, message = "body is required"))]
    pub body: String,
}

/// Publish a message body back onto the primary queue
pub async fn resubmit(
    State(state): State<AppState>,
    Json(request): Json<ResubmitRequest>,
) -> Result<Json<ResubmittedMessage>> {
    request.validate()?;

    let receipt = state
        .manager
        .resubmit(request.message_id, request.body)
        .await?;
    Ok(Json(receipt))
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    (StatusCode::OK, crate::broker::gather_metrics())
}
