use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::payments::types::WebhookEvent;
use crate::payments::utils::secure_eq;
use crate::services::reconciliation::{ReconciliationOutcome, ReconciliationService};

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid callback token")]
    InvalidToken,
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// How an authenticated callback was handled. Every variant is acknowledged
/// to the gateway with 200.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    Reconciled(ReconciliationOutcome),
    /// The attempt could not be written; logged for manual follow-up
    PersistenceFailed,
}

pub struct WebhookProcessor {
    callback_token: String,
    reconciliation: Arc<ReconciliationService>,
}

impl WebhookProcessor {
    pub fn new(
        callback_token: impl Into<String>,
        reconciliation: Arc<ReconciliationService>,
    ) -> Self {
        Self {
            callback_token: callback_token.into(),
            reconciliation,
        }
    }

    pub fn verify_token(&self, token: Option<&str>) -> Result<(), WebhookProcessorError> {
        let token = token.ok_or(WebhookProcessorError::InvalidToken)?;
        if self.callback_token.is_empty()
            || !secure_eq(token.as_bytes(), self.callback_token.as_bytes())
        {
            return Err(WebhookProcessorError::InvalidToken);
        }
        Ok(())
    }

    /// Authenticate, parse and apply one callback.
    ///
    /// The token is checked before the body is even parsed. After that only a
    /// body that is not a JSON object is an error.
    pub async fn process_webhook(
        &self,
        token: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookProcessorError> {
        if let Err(e) = self.verify_token(token) {
            warn!("Webhook callback token mismatch");
            return Err(e);
        }

        let payload: JsonValue = serde_json::from_slice(body)
            .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))?;
        let event = WebhookEvent::from_json(&payload).ok_or_else(|| {
            WebhookProcessorError::InvalidPayload("expected a JSON object".to_string())
        })?;

        let event = event.into_reconciliation(payload);
        info!(
            external_id = ?event.external_id,
            provider_payment_id = ?event.provider_payment_id,
            raw_status = %event.raw_status,
            "Xendit webhook received"
        );

        match self.reconciliation.apply(&event).await {
            Ok(outcome) => Ok(WebhookOutcome::Reconciled(outcome)),
            Err(e) => {
                error!(
                    external_id = ?event.external_id,
                    provider_payment_id = ?event.provider_payment_id,
                    error = %e,
                    "Failed to persist webhook status"
                );
                Ok(WebhookOutcome::PersistenceFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::{InMemoryOrderStore, InMemoryPaymentAttemptStore};

    fn processor(token: &str) -> WebhookProcessor {
        let reconciliation = Arc::new(ReconciliationService::new(
            Arc::new(InMemoryPaymentAttemptStore::new()),
            Arc::new(InMemoryOrderStore::new()),
        ));
        WebhookProcessor::new(token, reconciliation)
    }

    #[test]
    fn token_must_match_exactly() {
        let processor = processor("secret-token");
        assert!(processor.verify_token(Some("secret-token")).is_ok());
        assert!(processor.verify_token(Some("secret-token ")).is_err());
        assert!(processor.verify_token(None).is_err());
    }

    #[test]
    fn empty_configured_token_rejects_everything() {
        let processor = processor("");
        assert!(processor.verify_token(Some("")).is_err());
    }

    #[tokio::test]
    async fn bad_token_is_rejected_before_parsing() {
        let processor = processor("secret-token");
        let result = processor.process_webhook(Some("wrong"), b"not json").await;
        assert!(matches!(result, Err(WebhookProcessorError::InvalidToken)));
    }

    #[tokio::test]
    async fn non_object_body_is_invalid() {
        let processor = processor("secret-token");
        let result = processor
            .process_webhook(Some("secret-token"), b"[1,2,3]")
            .await;
        assert!(matches!(result, Err(WebhookProcessorError::InvalidPayload(_))));
    }
}
