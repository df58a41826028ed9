use crate::database::error::DatabaseError;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;

/// The two order fields payment reconciliation is allowed to write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: i64,
    pub status: String,
    pub payment_verified: bool,
}

pub const ORDER_STATUS_CONFIRMED: &str = "confirmed";

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Set `payment_verified = true` and `status = confirmed`.
    /// Re-applying is harmless. Returns false when the order does not exist.
    async fn mark_payment_verified(&self, order_id: i64) -> Result<bool, DatabaseError>;
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn mark_payment_verified(&self, order_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE orders
             SET payment_verified = TRUE, status = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(ORDER_STATUS_CONFIRMED)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
