use crate::error::{AppError, AppErrorKind, DomainError, InfrastructureError};
use thiserror::Error;

/// Classification of persistence failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    NotFound { entity: String, id: String },
    UniqueViolation { constraint: String },
    ConnectionError,
    PoolTimeout,
    QueryError,
    Unknown,
}

/// Error returned by every repository in this crate
#[derive(Debug, Clone, Error)]
#[error("database error: {message}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
    pub message: String,
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(
            DatabaseErrorKind::NotFound {
                entity: entity.to_string(),
                id: id.clone(),
            },
            format!("{} '{}' not found", entity, id),
        )
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::new(
                DatabaseErrorKind::NotFound {
                    entity: "row".to_string(),
                    id: String::new(),
                },
                err.to_string(),
            ),
            sqlx::Error::PoolTimedOut => Self::new(DatabaseErrorKind::PoolTimeout, err.to_string()),
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                Self::new(DatabaseErrorKind::ConnectionError, err.to_string())
            }
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => Self::new(
                DatabaseErrorKind::UniqueViolation {
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                },
                err.to_string(),
            ),
            sqlx::Error::Database(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_) => Self::new(DatabaseErrorKind::QueryError, err.to_string()),
            _ => Self::new(DatabaseErrorKind::Unknown, err.to_string()),
        }
    }

    /// Connection-level failures may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::ConnectionError | DatabaseErrorKind::PoolTimeout
        )
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err.kind {
            DatabaseErrorKind::NotFound { id, .. } => {
                AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
                    payment_id: id,
                }))
            }
            DatabaseErrorKind::UniqueViolation { .. } => {
                AppError::new(AppErrorKind::Domain(DomainError::DuplicateReference {
                    reference_id: err.message,
                }))
            }
            _ => {
                let is_retryable = err.is_retryable();
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: err.message,
                    is_retryable,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, DatabaseErrorKind::PoolTimeout);
        assert!(err.is_retryable());

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 500);
        assert!(app.is_retryable());
    }

    #[test]
    fn not_found_maps_to_404() {
        let app: AppError = DatabaseError::not_found("payment_attempt", "qris_QRIS_1").into();
        assert_eq!(app.status_code(), 404);
    }

    #[test]
    fn displays_as_std_error() {
        let err = DatabaseError::new(DatabaseErrorKind::ConnectionError, "connection refused");
        let boxed: Box<dyn std::error::Error> = Box::new(err);
        assert_eq!(boxed.to_string(), "database error: connection refused");
    }
}
