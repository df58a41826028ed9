//! Error handling for the POS backend
//!
//! Provides a unified error type with HTTP status mapping, user-facing
//! messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error codes returned in error responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "PAYMENT_NOT_FOUND")]
    PaymentNotFound,
    #[serde(rename = "DUPLICATE_REFERENCE")]
    DuplicateReference,

    // Auth errors (401)
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INVALID_CALLBACK_TOKEN")]
    InvalidCallbackToken,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Business rule errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No payment attempt matches the given reference or provider ID
    PaymentNotFound { payment_id: String },
    /// A payment attempt with this reference ID already exists
    DuplicateReference { reference_id: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Configuration { message: String },
}

/// Errors raised by the payment gateway
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Non-2xx answer or unusable response from the payment provider
    PaymentProvider {
        provider: String,
        message: String,
        http_status: Option<u16>,
        raw_body: Option<String>,
        is_retryable: bool,
    },
    /// Transport failure or timeout talking to the provider
    Timeout { service: String, timeout_secs: u64 },
    Unavailable { service: String, message: String },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidAmount { amount: String, reason: String },
    MissingField { field: String },
    OutOfRange {
        field: String,
        min: Option<String>,
        max: Option<String>,
    },
    InvalidField { field: String, reason: String },
    MalformedBody { reason: String },
}

/// Authentication failures for merchant routes and the webhook route
#[derive(Debug, Clone)]
pub enum AuthError {
    MissingBearerToken,
    InvalidBearerToken { reason: String },
    InvalidCallbackToken,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
    Auth(AuthError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn validation(kind: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(kind))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => 404,
                DomainError::DuplicateReference { .. } => 409,
            },
            AppErrorKind::Infrastructure(_) => 500,
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502,
                ExternalError::Timeout { .. } => 504,
                ExternalError::Unavailable { .. } => 503,
            },
            AppErrorKind::Validation(_) => 400,
            AppErrorKind::Auth(_) => 401,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { .. } => ErrorCode::PaymentNotFound,
                DomainError::DuplicateReference { .. } => ErrorCode::DuplicateReference,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } | ExternalError::Unavailable { .. } => {
                    ErrorCode::PaymentProviderError
                }
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Auth(err) => match err {
                AuthError::InvalidCallbackToken => ErrorCode::InvalidCallbackToken,
                _ => ErrorCode::Unauthorized,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::PaymentNotFound { payment_id } => {
                    format!("Payment '{}' not found", payment_id)
                }
                DomainError::DuplicateReference { reference_id } => {
                    format!("Payment reference '{}' already exists", reference_id)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        format!("Payment provider ({}) rejected the request", provider)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds. Please try again",
                    service, timeout_secs
                ),
                ExternalError::Unavailable { service, .. } => {
                    format!("{} is unreachable. Please try again", service)
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::OutOfRange { field, min, max } => match (min, max) {
                    (Some(min), Some(max)) => {
                        format!("Field '{}' must be between {} and {}", field, min, max)
                    }
                    (Some(min), None) => format!("Field '{}' must be at least {}", field, min),
                    (None, Some(max)) => format!("Field '{}' must be at most {}", field, max),
                    (None, None) => format!("Field '{}' is out of acceptable range", field),
                },
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
                ValidationError::MalformedBody { reason } => {
                    format!("Invalid request body: {}", reason)
                }
            },
            AppErrorKind::Auth(err) => match err {
                AuthError::MissingBearerToken => "Missing bearer token".to_string(),
                AuthError::InvalidBearerToken { .. } => "Invalid or expired token".to_string(),
                AuthError::InvalidCallbackToken => "Unauthorized".to_string(),
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
                ExternalError::Unavailable { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
            AppErrorKind::Auth(_) => false,
        }
    }

    /// Diagnostic details attached to the error response.
    ///
    /// Provider failures carry the provider's raw body so checkout staff can
    /// see why the gateway refused the charge.
    pub fn details(&self) -> Option<serde_json::Value> {
        match &self.kind {
            AppErrorKind::External(ExternalError::PaymentProvider {
                provider,
                message,
                http_status,
                raw_body,
                ..
            }) => Some(serde_json::json!({
                "provider": provider,
                "message": message,
                "http_status": http_status,
                "raw_body": raw_body,
            })),
            AppErrorKind::Validation(ValidationError::InvalidField { field, reason }) => {
                Some(serde_json::json!({ "field": field, "error": reason }))
            }
            AppErrorKind::Validation(ValidationError::MissingField { field }) => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// From<DatabaseError> lives in database/error.rs, From<PaymentError> in payments/error.rs

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
