use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::payments::types::{PaymentMethodKind, PaymentStatus};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// One request to charge a customer through the gateway
#[derive(Debug, Clone, Serialize)]
pub struct PaymentAttempt {
    pub id: i64,
    pub reference_id: String,
    pub provider_payment_id: Option<String>,
    pub method: PaymentMethodKind,
    pub channel_code: String,
    pub channel_id: String,
    pub amount: BigDecimal,
    pub paid_amount: Option<BigDecimal>,
    pub status: PaymentStatus,
    pub order_id: Option<i64>,
    pub customer_name: String,
    pub provider_payload: Option<JsonValue>,
    pub webhook_payload: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentAttempt {
    pub reference_id: String,
    pub provider_payment_id: Option<String>,
    pub method: PaymentMethodKind,
    pub channel_code: String,
    pub channel_id: String,
    pub amount: BigDecimal,
    pub status: PaymentStatus,
    pub order_id: Option<i64>,
    pub customer_name: String,
    pub provider_payload: JsonValue,
}

/// Status change to apply to whichever attempt matches either identifier
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub reference_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub status: PaymentStatus,
    /// `None` keeps the stored value
    pub paid_amount: Option<BigDecimal>,
    pub payload: JsonValue,
}

#[derive(Debug, Clone)]
pub enum StatusUpdateResult {
    /// The attempt accepted the new status (possibly the same one again)
    Applied(PaymentAttempt),
    /// The attempt exists but the move would leave a terminal state
    Unchanged(PaymentAttempt),
    NotFound,
}

/// Persistence boundary for payment attempts
#[async_trait]
pub trait PaymentAttemptStore: Send + Sync {
    async fn create(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, DatabaseError>;

    /// Single lookup matching `reference_id` OR `provider_payment_id`
    async fn find_by_reference_or_provider_id(
        &self,
        reference_id: Option<&str>,
        provider_payment_id: Option<&str>,
    ) -> Result<Option<PaymentAttempt>, DatabaseError>;

    /// Atomically advance the status.
    ///
    /// Implementations must apply the guard and the write as one step so
    /// concurrent duplicate deliveries converge on the same row state.
    /// `paid_at` is set by the first money-received update and never cleared.
    async fn update_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusUpdateResult, DatabaseError>;
}

#[derive(Debug, FromRow)]
struct PaymentAttemptRow {
    id: i64,
    reference_id: String,
    provider_payment_id: Option<String>,
    method: String,
    channel_code: String,
    channel_id: String,
    amount: BigDecimal,
    paid_amount: Option<BigDecimal>,
    status: String,
    order_id: Option<i64>,
    customer_name: String,
    provider_payload: Option<JsonValue>,
    webhook_payload: Option<JsonValue>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentAttemptRow> for PaymentAttempt {
    type Error = DatabaseError;

    fn try_from(row: PaymentAttemptRow) -> Result<Self, Self::Error> {
        let invalid = |column: &str, value: &str| {
            DatabaseError::new(
                DatabaseErrorKind::QueryError,
                format!("invalid {} '{}' for attempt {}", column, value, row.reference_id),
            )
        };
        let method =
            PaymentMethodKind::from_str(&row.method).map_err(|_| invalid("method", &row.method))?;
        let status =
            PaymentStatus::from_str(&row.status).map_err(|_| invalid("status", &row.status))?;

        Ok(PaymentAttempt {
            id: row.id,
            reference_id: row.reference_id,
            provider_payment_id: row.provider_payment_id,
            method,
            channel_code: row.channel_code,
            channel_id: row.channel_id,
            amount: row.amount,
            paid_amount: row.paid_amount,
            status,
            order_id: row.order_id,
            customer_name: row.customer_name,
            provider_payload: row.provider_payload,
            webhook_payload: row.webhook_payload,
            created_at: row.created_at,
            updated_at: row.updated_at,
            paid_at: row.paid_at,
        })
    }
}

const ATTEMPT_COLUMNS: &str = "id, reference_id, provider_payment_id, method, channel_code, \
     channel_id, amount, paid_amount, status, order_id, customer_name, provider_payload, \
     webhook_payload, created_at, updated_at, paid_at";

/// PostgreSQL-backed payment attempt store
#[derive(Clone)]
pub struct PaymentAttemptRepository {
    pool: PgPool,
}

impl PaymentAttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentAttemptStore for PaymentAttemptRepository {
    async fn create(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, DatabaseError> {
        let query = format!(
            "INSERT INTO payment_attempts
                (reference_id, provider_payment_id, method, channel_code, channel_id,
                 amount, status, order_id, customer_name, provider_payload)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {}",
            ATTEMPT_COLUMNS
        );

        let row = sqlx::query_as::<_, PaymentAttemptRow>(&query)
            .bind(&attempt.reference_id)
            .bind(&attempt.provider_payment_id)
            .bind(attempt.method.as_str())
            .bind(&attempt.channel_code)
            .bind(&attempt.channel_id)
            .bind(&attempt.amount)
            .bind(attempt.status.as_str())
            .bind(attempt.order_id)
            .bind(&attempt.customer_name)
            .bind(&attempt.provider_payload)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        row.try_into()
    }

    async fn find_by_reference_or_provider_id(
        &self,
        reference_id: Option<&str>,
        provider_payment_id: Option<&str>,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        if reference_id.is_none() && provider_payment_id.is_none() {
            return Ok(None);
        }

        let query = format!(
            "SELECT {} FROM payment_attempts
             WHERE reference_id = $1 OR provider_payment_id = $2
             ORDER BY id ASC
             LIMIT 1",
            ATTEMPT_COLUMNS
        );

        sqlx::query_as::<_, PaymentAttemptRow>(&query)
            .bind(reference_id)
            .bind(provider_payment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?
            .map(PaymentAttempt::try_from)
            .transpose()
    }

    async fn update_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusUpdateResult, DatabaseError> {
        let reference_id = update.reference_id.as_deref();
        let provider_payment_id = update.provider_payment_id.as_deref();
        if reference_id.is_none() && provider_payment_id.is_none() {
            return Ok(StatusUpdateResult::NotFound);
        }

        // The WHERE clause mirrors PaymentStatus::can_transition_to so the
        // guard and the write happen in one statement.
        let query = format!(
            "UPDATE payment_attempts
             SET status = $3,
                 paid_amount = COALESCE($4, paid_amount),
                 paid_at = CASE WHEN $5 AND paid_at IS NULL THEN NOW() ELSE paid_at END,
                 webhook_payload = $6,
                 updated_at = NOW()
             WHERE (reference_id = $1 OR provider_payment_id = $2)
               AND (status = $3
                    OR status = 'pending'
                    OR (status = 'paid' AND $3 = 'settled')
                    OR (status IN ('expired', 'failed') AND $5))
             RETURNING {}",
            ATTEMPT_COLUMNS
        );

        let updated = sqlx::query_as::<_, PaymentAttemptRow>(&query)
            .bind(reference_id)
            .bind(provider_payment_id)
            .bind(update.status.as_str())
            .bind(&update.paid_amount)
            .bind(update.status.is_money_received())
            .bind(&update.payload)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        if let Some(row) = updated {
            return Ok(StatusUpdateResult::Applied(row.try_into()?));
        }

        match self
            .find_by_reference_or_provider_id(reference_id, provider_payment_id)
            .await?
        {
            Some(existing) => Ok(StatusUpdateResult::Unchanged(existing)),
            None => Ok(StatusUpdateResult::NotFound),
        }
    }
}
