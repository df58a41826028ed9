//! In-memory stores with the same semantics as the PostgreSQL repositories.
//!
//! Every mutation runs under a single write lock, which gives the same
//! all-or-nothing behaviour as the guarded `UPDATE` statement.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::database::order_repository::{Order, OrderStore, ORDER_STATUS_CONFIRMED};
use crate::database::payment_attempt_repository::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptStore, StatusUpdate, StatusUpdateResult,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

fn identifies(
    attempt: &PaymentAttempt,
    reference_id: Option<&str>,
    provider_id: Option<&str>,
) -> bool {
    reference_id.is_some_and(|r| attempt.reference_id == r)
        || provider_id.is_some_and(|p| attempt.provider_payment_id.as_deref() == Some(p))
}

#[derive(Default, Clone)]
pub struct InMemoryPaymentAttemptStore {
    attempts: Arc<RwLock<Vec<PaymentAttempt>>>,
}

impl InMemoryPaymentAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<PaymentAttempt> {
        self.attempts.read().await.clone()
    }
}

#[async_trait]
impl PaymentAttemptStore for InMemoryPaymentAttemptStore {
    async fn create(&self, attempt: NewPaymentAttempt) -> Result<PaymentAttempt, DatabaseError> {
        let mut attempts = self.attempts.write().await;
        if attempts
            .iter()
            .any(|a| a.reference_id == attempt.reference_id)
        {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueViolation {
                    constraint: "payment_attempts_reference_id_key".to_string(),
                },
                attempt.reference_id,
            ));
        }

        let now = Utc::now();
        let stored = PaymentAttempt {
            id: attempts.len() as i64 + 1,
            reference_id: attempt.reference_id,
            provider_payment_id: attempt.provider_payment_id,
            method: attempt.method,
            channel_code: attempt.channel_code,
            channel_id: attempt.channel_id,
            amount: attempt.amount,
            paid_amount: None,
            status: attempt.status,
            order_id: attempt.order_id,
            customer_name: attempt.customer_name,
            provider_payload: Some(attempt.provider_payload),
            webhook_payload: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        attempts.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_reference_or_provider_id(
        &self,
        reference_id: Option<&str>,
        provider_payment_id: Option<&str>,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .iter()
            .find(|a| identifies(a, reference_id, provider_payment_id))
            .cloned())
    }

    async fn update_status(
        &self,
        update: &StatusUpdate,
    ) -> Result<StatusUpdateResult, DatabaseError> {
        let mut attempts = self.attempts.write().await;
        let reference_id = update.reference_id.as_deref();
        let provider_payment_id = update.provider_payment_id.as_deref();

        let Some(attempt) = attempts
            .iter_mut()
            .find(|a| identifies(a, reference_id, provider_payment_id))
        else {
            return Ok(StatusUpdateResult::NotFound);
        };

        if !attempt.status.can_transition_to(update.status) {
            return Ok(StatusUpdateResult::Unchanged(attempt.clone()));
        }

        let now = Utc::now();
        attempt.status = update.status;
        if let Some(paid_amount) = &update.paid_amount {
            attempt.paid_amount = Some(paid_amount.clone());
        }
        if update.status.is_money_received() && attempt.paid_at.is_none() {
            attempt.paid_at = Some(now);
        }
        attempt.webhook_payload = Some(update.payload.clone());
        attempt.updated_at = now;

        Ok(StatusUpdateResult::Applied(attempt.clone()))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<i64, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id, order);
    }

    pub async fn get(&self, order_id: i64) -> Option<Order> {
        self.orders.read().await.get(&order_id).cloned()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn mark_payment_verified(&self, order_id: i64) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order_id) {
            Some(order) => {
                order.payment_verified = true;
                order.status = ORDER_STATUS_CONFIRMED.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{PaymentMethodKind, PaymentStatus};
    use bigdecimal::BigDecimal;
    use serde_json::json;

    fn new_attempt() -> NewPaymentAttempt {
        NewPaymentAttempt {
            reference_id: "qris_ABC_123".to_string(),
            provider_payment_id: Some("prov_999".to_string()),
            method: PaymentMethodKind::Qris,
            channel_code: "QRIS".to_string(),
            channel_id: "ABC".to_string(),
            amount: BigDecimal::from(50_000),
            status: PaymentStatus::Pending,
            order_id: None,
            customer_name: "Customer".to_string(),
            provider_payload: json!({}),
        }
    }

    #[tokio::test]
    async fn finds_by_either_key() {
        let store = InMemoryPaymentAttemptStore::new();
        store.create(new_attempt()).await.unwrap();

        let by_provider = store
            .find_by_reference_or_provider_id(None, Some("prov_999"))
            .await
            .unwrap();
        assert_eq!(by_provider.unwrap().reference_id, "qris_ABC_123");

        let by_reference = store
            .find_by_reference_or_provider_id(Some("qris_ABC_123"), Some("other"))
            .await
            .unwrap();
        assert!(by_reference.is_some());

        assert!(store
            .find_by_reference_or_provider_id(None, None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_reference_is_rejected() {
        let store = InMemoryPaymentAttemptStore::new();
        store.create(new_attempt()).await.unwrap();
        let err = store.create(new_attempt()).await.unwrap_err();
        assert!(matches!(err.kind, DatabaseErrorKind::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn settled_is_not_reopened_by_late_paid() {
        let store = InMemoryPaymentAttemptStore::new();
        store.create(new_attempt()).await.unwrap();

        let update = |status| StatusUpdate {
            reference_id: Some("qris_ABC_123".to_string()),
            provider_payment_id: None,
            status,
            paid_amount: None,
            payload: json!({}),
        };

        store.update_status(&update(PaymentStatus::Settled)).await.unwrap();
        let result = store.update_status(&update(PaymentStatus::Paid)).await.unwrap();
        match result {
            StatusUpdateResult::Unchanged(attempt) => {
                assert_eq!(attempt.status, PaymentStatus::Settled)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn order_marking_is_idempotent() {
        let orders = InMemoryOrderStore::new();
        orders
            .insert(Order {
                id: 7,
                status: "pending".to_string(),
                payment_verified: false,
            })
            .await;

        assert!(orders.mark_payment_verified(7).await.unwrap());
        assert!(orders.mark_payment_verified(7).await.unwrap());
        assert!(!orders.mark_payment_verified(8).await.unwrap());

        let order = orders.get(7).await.unwrap();
        assert!(order.payment_verified);
        assert_eq!(order.status, "confirmed");
    }
}
