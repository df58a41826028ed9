//! Charge initiation: validate, call the gateway, record the attempt.
//!
//! A gateway failure aborts with nothing stored. A storage failure after
//! the gateway accepted the charge is logged and the customer still gets
//! the payment details; the webhook or a later sync fills the gap.

use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::CheckoutConfig;
use crate::database::payment_attempt_repository::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptStore,
};
use crate::error::{AppError, AppErrorKind, DomainError, ValidationError};
use crate::logging::mask_customer_name;
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    ChargeChannel, ChargeDisplay, ChargeRequest, PaymentStatus, ReconciliationEvent,
};
use crate::services::reconciliation::{ReconciliationOutcome, ReconciliationService};
use crate::services::reference::ReferenceIdGenerator;

pub const DEFAULT_CHANNEL_ID: &str = "pos_main";
pub const DEFAULT_CUSTOMER_NAME: &str = "Customer";

#[derive(Debug, Clone, Deserialize)]
pub struct QrisPaymentRequest {
    pub amount: BigDecimal,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualAccountPaymentRequest {
    pub amount: BigDecimal,
    #[serde(default)]
    pub bank_code: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EwalletPaymentRequest {
    pub amount: BigDecimal,
    #[serde(default)]
    pub wallet_type: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub failure_url: Option<String>,
}

/// Body returned to the POS after a charge is created
#[derive(Debug, Clone, Serialize)]
pub struct ChargeResponse {
    pub success: bool,
    pub payment_id: String,
    pub reference_id: String,
    pub status: PaymentStatus,
    pub provider_status: String,
    pub amount: BigDecimal,
    #[serde(flatten)]
    pub display: ChargeDisplay,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub changed: bool,
    pub provider_status: String,
    pub payment: PaymentAttempt,
}

struct Initiation {
    channel: ChargeChannel,
    amount: BigDecimal,
    order_id: Option<i64>,
    channel_id: Option<String>,
    customer_name: Option<String>,
}

pub struct ChargeService {
    provider: Arc<dyn PaymentProvider>,
    attempts: Arc<dyn PaymentAttemptStore>,
    reconciliation: Arc<ReconciliationService>,
    references: ReferenceIdGenerator,
    checkout: CheckoutConfig,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_code(value: &str, field: &str) -> Result<String, AppError> {
    let code = value.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::validation(ValidationError::MissingField {
            field: field.to_string(),
        }));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "only letters, digits and underscores are allowed".to_string(),
        }));
    }
    Ok(code)
}

impl ChargeService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        attempts: Arc<dyn PaymentAttemptStore>,
        reconciliation: Arc<ReconciliationService>,
        checkout: CheckoutConfig,
    ) -> Self {
        Self {
            provider,
            attempts,
            reconciliation,
            references: ReferenceIdGenerator::new(),
            checkout,
        }
    }

    pub fn validate_amount(&self, amount: &BigDecimal) -> Result<(), AppError> {
        let invalid = |reason: &str| {
            AppError::validation(ValidationError::InvalidAmount {
                amount: amount.to_string(),
                reason: reason.to_string(),
            })
        };

        if amount <= &BigDecimal::zero() {
            return Err(invalid("Amount must be greater than zero"));
        }
        if !amount.is_integer() {
            return Err(invalid("Amount must be a whole number of rupiah"));
        }

        let min = BigDecimal::from(self.checkout.min_amount);
        let max = BigDecimal::from(self.checkout.max_amount);
        if amount < &min || amount > &max {
            return Err(AppError::validation(ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: Some(min.to_string()),
                max: Some(max.to_string()),
            }));
        }
        Ok(())
    }

    pub async fn create_qris_payment(
        &self,
        request: QrisPaymentRequest,
    ) -> Result<ChargeResponse, AppError> {
        self.initiate(Initiation {
            channel: ChargeChannel::Qris,
            amount: request.amount,
            order_id: request.order_id,
            channel_id: request.channel_id,
            customer_name: request.customer_name,
        })
        .await
    }

    pub async fn create_virtual_account_payment(
        &self,
        request: VirtualAccountPaymentRequest,
    ) -> Result<ChargeResponse, AppError> {
        let bank_code = required_code(&request.bank_code, "bank_code")?;
        self.initiate(Initiation {
            channel: ChargeChannel::VirtualAccount { bank_code },
            amount: request.amount,
            order_id: request.order_id,
            channel_id: request.channel_id,
            customer_name: request.customer_name,
        })
        .await
    }

    pub async fn create_ewallet_payment(
        &self,
        request: EwalletPaymentRequest,
    ) -> Result<ChargeResponse, AppError> {
        let wallet_type = required_code(&request.wallet_type, "wallet_type")?;
        let success_url = non_empty(request.success_url)
            .unwrap_or_else(|| self.checkout.ewallet_success_url.clone());
        let failure_url = non_empty(request.failure_url)
            .unwrap_or_else(|| self.checkout.ewallet_failure_url.clone());

        self.initiate(Initiation {
            channel: ChargeChannel::Ewallet {
                wallet_type,
                success_url,
                failure_url,
            },
            amount: request.amount,
            order_id: request.order_id,
            channel_id: request.channel_id,
            customer_name: request.customer_name,
        })
        .await
    }

    async fn initiate(&self, initiation: Initiation) -> Result<ChargeResponse, AppError> {
        self.validate_amount(&initiation.amount)?;

        let channel_id =
            non_empty(initiation.channel_id).unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string());
        let customer_name = non_empty(initiation.customer_name)
            .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string());
        let method = initiation.channel.method();
        let channel_code = initiation.channel.channel_code().to_string();

        let reference_id = self.references.generate(method, &channel_code);

        info!(
            reference_id = %reference_id,
            method = %method,
            channel_code = %channel_code,
            amount = %initiation.amount,
            customer = %mask_customer_name(&customer_name),
            "Initiating charge"
        );

        let result = self
            .provider
            .create_charge(ChargeRequest {
                reference_id: reference_id.clone(),
                amount: initiation.amount.clone(),
                customer_name: customer_name.clone(),
                channel: initiation.channel,
            })
            .await
            .map_err(|e| {
                warn!(reference_id = %reference_id, error = %e, "Gateway rejected charge");
                AppError::from(e)
            })?;

        let stored = self
            .attempts
            .create(NewPaymentAttempt {
                reference_id: reference_id.clone(),
                provider_payment_id: Some(result.provider_payment_id.clone()),
                method,
                channel_code,
                channel_id,
                amount: initiation.amount.clone(),
                status: result.status,
                order_id: initiation.order_id,
                customer_name,
                provider_payload: result.raw_response.clone(),
            })
            .await;

        if let Err(e) = stored {
            error!(
                reference_id = %reference_id,
                provider_payment_id = %result.provider_payment_id,
                error = %e,
                "Failed to store payment attempt; continuing with gateway response"
            );
        }

        Ok(ChargeResponse {
            success: true,
            payment_id: result.provider_payment_id,
            reference_id,
            status: result.status,
            provider_status: result.raw_status,
            amount: initiation.amount,
            display: result.display,
        })
    }

    /// Look up an attempt by reference ID or provider ID
    pub async fn get_payment(&self, id: &str) -> Result<PaymentAttempt, AppError> {
        self.attempts
            .find_by_reference_or_provider_id(Some(id), Some(id))
            .await?
            .ok_or_else(|| {
                AppError::new(AppErrorKind::Domain(DomainError::PaymentNotFound {
                    payment_id: id.to_string(),
                }))
            })
    }

    /// Poll the gateway for an attempt's status and reconcile it
    pub async fn sync_payment(&self, id: &str) -> Result<SyncResponse, AppError> {
        let attempt = self.get_payment(id).await?;
        let provider_payment_id = attempt.provider_payment_id.clone().ok_or_else(|| {
            AppError::validation(ValidationError::InvalidField {
                field: "id".to_string(),
                reason: "payment has no gateway id yet".to_string(),
            })
        })?;

        let remote = self
            .provider
            .get_charge_status(attempt.method, &provider_payment_id)
            .await?;

        let event = ReconciliationEvent {
            external_id: Some(attempt.reference_id.clone()),
            provider_payment_id: Some(provider_payment_id),
            raw_status: remote.raw_status.clone(),
            status: remote.status,
            paid_amount: remote.paid_amount,
            payload: remote.raw_response,
        };

        let outcome = self.reconciliation.apply(&event).await?;
        let (changed, payment) = match outcome {
            ReconciliationOutcome::Applied { attempt: updated, .. } => {
                (updated.status != attempt.status, updated)
            }
            ReconciliationOutcome::Unchanged { attempt: current, .. } => (false, current),
            ReconciliationOutcome::NotFound => (false, attempt),
        };

        Ok(SyncResponse {
            success: true,
            changed,
            provider_status: remote.raw_status,
            payment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_trimmed_and_uppercased() {
        assert_eq!(required_code(" bca ", "bank_code").unwrap(), "BCA");
        assert_eq!(required_code("id_ovo", "wallet_type").unwrap(), "ID_OVO");
        assert!(required_code("  ", "bank_code").is_err());
        assert!(required_code("BC A", "bank_code").is_err());
    }

    #[test]
    fn blank_optional_strings_are_dropped() {
        assert_eq!(non_empty(Some("  ".to_string())), None);
        assert_eq!(non_empty(Some(" till-2 ".to_string())), Some("till-2".to_string()));
    }
}
