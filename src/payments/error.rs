use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    /// Transport failure; `timed_out` is set when the request deadline fired
    #[error("Network error: {message}")]
    NetworkError { message: String, timed_out: bool },

    #[error("Webhook verification failed: {message}")]
    WebhookVerificationError { message: String },

    /// Non-2xx answer or unusable body from the gateway
    #[error("Provider error: provider={provider}, message={message}")]
    ProviderError {
        provider: String,
        message: String,
        http_status: Option<u16>,
        raw_body: Option<String>,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ValidationError { .. } => false,
            PaymentError::NetworkError { .. } => true,
            PaymentError::WebhookVerificationError { .. } => false,
            PaymentError::ProviderError { http_status, .. } => {
                matches!(http_status, Some(status) if *status >= 500 || *status == 429)
            }
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { timed_out: true, .. } => 504,
            PaymentError::NetworkError { .. } => 503,
            PaymentError::WebhookVerificationError { .. } => 401,
            PaymentError::ProviderError { .. } => 502,
        }
    }
}

impl From<PaymentError> for crate::error::AppError {
    fn from(err: PaymentError) -> Self {
        use crate::error::{AppError, AppErrorKind, AuthError, ExternalError, ValidationError};
        use crate::payments::providers::xendit::PROVIDER_NAME;

        let is_retryable = err.is_retryable();
        match err {
            PaymentError::ValidationError { message, field } => match field {
                Some(field) => AppError::validation(ValidationError::InvalidField {
                    field,
                    reason: message,
                }),
                None => AppError::validation(ValidationError::MalformedBody { reason: message }),
            },
            PaymentError::NetworkError {
                timed_out: true, ..
            } => AppError::new(AppErrorKind::External(ExternalError::Timeout {
                service: PROVIDER_NAME.to_string(),
                timeout_secs: crate::payments::providers::xendit::DEFAULT_TIMEOUT_SECS,
            })),
            PaymentError::NetworkError { message, .. } => {
                AppError::new(AppErrorKind::External(ExternalError::Unavailable {
                    service: PROVIDER_NAME.to_string(),
                    message,
                }))
            }
            PaymentError::WebhookVerificationError { .. } => {
                AppError::new(AppErrorKind::Auth(AuthError::InvalidCallbackToken))
            }
            PaymentError::ProviderError {
                provider,
                message,
                http_status,
                raw_body,
            } => AppError::new(AppErrorKind::External(ExternalError::PaymentProvider {
                provider,
                message,
                http_status,
                raw_body,
                is_retryable,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            PaymentError::ValidationError {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            PaymentError::NetworkError {
                message: "deadline".to_string(),
                timed_out: true
            }
            .http_status_code(),
            504
        );
    }

    #[test]
    fn retryable_flags_follow_http_status() {
        let rejected = PaymentError::ProviderError {
            provider: "xendit".to_string(),
            message: "HTTP 400".to_string(),
            http_status: Some(400),
            raw_body: None,
        };
        assert!(!rejected.is_retryable());

        let outage = PaymentError::ProviderError {
            provider: "xendit".to_string(),
            message: "HTTP 503".to_string(),
            http_status: Some(503),
            raw_body: None,
        };
        assert!(outage.is_retryable());
    }

    #[test]
    fn provider_error_keeps_raw_body_in_app_error() {
        let app: AppError = PaymentError::ProviderError {
            provider: "xendit".to_string(),
            message: "HTTP 400".to_string(),
            http_status: Some(400),
            raw_body: Some(r#"{"error_code":"INVALID_AMOUNT"}"#.to_string()),
        }
        .into();

        assert_eq!(app.status_code(), 502);
        let details = app.details().unwrap();
        assert_eq!(details["raw_body"], r#"{"error_code":"INVALID_AMOUNT"}"#);
    }
}
