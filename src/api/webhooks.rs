use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AppErrorKind, AuthError, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::reconciliation::ReconciliationOutcome;
use crate::services::webhook_processor::{WebhookOutcome, WebhookProcessor, WebhookProcessorError};

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

pub struct WebhookState {
    pub processor: Arc<WebhookProcessor>,
}

/// POST /api/webhooks/xendit
///
/// Once the callback token checks out, the gateway always gets 200 so it
/// stops redelivering; misses and storage failures are only logged.
pub async fn handle_xendit_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let request_id = get_request_id_from_headers(&headers);
    let with_request_id = |err: AppError| match &request_id {
        Some(id) => err.with_request_id(id.clone()),
        None => err,
    };

    match state.processor.process_webhook(token, &body).await {
        Ok(outcome) => {
            match &outcome {
                WebhookOutcome::Reconciled(ReconciliationOutcome::NotFound) => {
                    info!("Webhook acknowledged without a matching payment")
                }
                WebhookOutcome::PersistenceFailed => {
                    warn!("Webhook acknowledged despite a storage failure")
                }
                WebhookOutcome::Reconciled(_) => info!("Webhook processed successfully"),
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "success": true,
                    "message": "Webhook processed",
                })),
            )
                .into_response()
        }
        Err(WebhookProcessorError::InvalidToken) => {
            with_request_id(AppError::new(AppErrorKind::Auth(AuthError::InvalidCallbackToken)))
                .into_response()
        }
        Err(WebhookProcessorError::InvalidPayload(reason)) => {
            warn!(reason = %reason, "Invalid webhook payload");
            with_request_id(AppError::validation(ValidationError::MalformedBody { reason }))
                .into_response()
        }
    }
}
