//! Applies gateway status changes to payment attempts and their orders.
//!
//! Shared by the webhook path and the manual provider poll so both obey the
//! same monotonic state machine.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::database::error::DatabaseError;
use crate::database::order_repository::OrderStore;
use crate::database::payment_attempt_repository::{
    PaymentAttempt, PaymentAttemptStore, StatusUpdate, StatusUpdateResult,
};
use crate::payments::types::ReconciliationEvent;

#[derive(Debug, Clone)]
pub enum ReconciliationOutcome {
    /// Status written; `order_verified` reports whether the linked order was confirmed
    Applied {
        attempt: PaymentAttempt,
        order_verified: bool,
    },
    /// The attempt is in a terminal state the event may not leave
    Unchanged {
        attempt: PaymentAttempt,
        order_verified: bool,
    },
    /// Nothing stored under either identifier
    NotFound,
}

impl ReconciliationOutcome {
    pub fn attempt(&self) -> Option<&PaymentAttempt> {
        match self {
            ReconciliationOutcome::Applied { attempt, .. }
            | ReconciliationOutcome::Unchanged { attempt, .. } => Some(attempt),
            ReconciliationOutcome::NotFound => None,
        }
    }
}

pub struct ReconciliationService {
    attempts: Arc<dyn PaymentAttemptStore>,
    orders: Arc<dyn OrderStore>,
}

impl ReconciliationService {
    pub fn new(attempts: Arc<dyn PaymentAttemptStore>, orders: Arc<dyn OrderStore>) -> Self {
        Self { attempts, orders }
    }

    /// Apply one event. Only the attempt update can fail; an order update
    /// failure is logged and reported through `order_verified = false`.
    pub async fn apply(
        &self,
        event: &ReconciliationEvent,
    ) -> Result<ReconciliationOutcome, DatabaseError> {
        if event.external_id.is_none() && event.provider_payment_id.is_none() {
            warn!(
                raw_status = %event.raw_status,
                "Gateway event carries no reference or provider id"
            );
            return Ok(ReconciliationOutcome::NotFound);
        }

        // Intermediate events may carry partial amounts; only money-received
        // events are allowed to write paid_amount.
        let paid_amount = if event.status.is_money_received() {
            event.paid_amount.clone()
        } else {
            None
        };

        let update = StatusUpdate {
            reference_id: event.external_id.clone(),
            provider_payment_id: event.provider_payment_id.clone(),
            status: event.status,
            paid_amount,
            payload: event.payload.clone(),
        };

        match self.attempts.update_status(&update).await? {
            StatusUpdateResult::Applied(attempt) => {
                info!(
                    reference_id = %attempt.reference_id,
                    status = %attempt.status,
                    raw_status = %event.raw_status,
                    "Payment attempt reconciled"
                );
                let order_verified = self.confirm_order(event, &attempt).await;
                Ok(ReconciliationOutcome::Applied {
                    attempt,
                    order_verified,
                })
            }
            StatusUpdateResult::Unchanged(attempt) => {
                info!(
                    reference_id = %attempt.reference_id,
                    current_status = %attempt.status,
                    incoming_status = %event.status,
                    "Ignoring transition out of terminal state"
                );
                // Heals an order left unconfirmed by an earlier failed write
                let order_verified = self.confirm_order(event, &attempt).await;
                Ok(ReconciliationOutcome::Unchanged {
                    attempt,
                    order_verified,
                })
            }
            StatusUpdateResult::NotFound => {
                warn!(
                    external_id = ?event.external_id,
                    provider_payment_id = ?event.provider_payment_id,
                    raw_status = %event.raw_status,
                    "Reconciliation miss: no local payment attempt"
                );
                Ok(ReconciliationOutcome::NotFound)
            }
        }
    }

    async fn confirm_order(&self, event: &ReconciliationEvent, attempt: &PaymentAttempt) -> bool {
        if !event.status.is_money_received() || !attempt.status.is_money_received() {
            return false;
        }
        let Some(order_id) = attempt.order_id else {
            return false;
        };

        match self.orders.mark_payment_verified(order_id).await {
            Ok(true) => {
                info!(order_id, reference_id = %attempt.reference_id, "Order payment verified");
                true
            }
            Ok(false) => {
                warn!(order_id, reference_id = %attempt.reference_id, "Linked order not found");
                false
            }
            Err(e) => {
                error!(
                    order_id,
                    reference_id = %attempt.reference_id,
                    error = %e,
                    "Failed to mark order as paid"
                );
                false
            }
        }
    }
}
