use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    Qris,
    VirtualAccount,
    Ewallet,
}

impl PaymentMethodKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodKind::Qris => "qris",
            PaymentMethodKind::VirtualAccount => "virtual_account",
            PaymentMethodKind::Ewallet => "ewallet",
        }
    }

    /// Leading segment of reference IDs issued for this method
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentMethodKind::Qris => "qris",
            PaymentMethodKind::VirtualAccount => "va",
            PaymentMethodKind::Ewallet => "ewallet",
        }
    }
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentMethodKind {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "qris" => Ok(PaymentMethodKind::Qris),
            "virtual_account" | "va" => Ok(PaymentMethodKind::VirtualAccount),
            "ewallet" | "e_wallet" => Ok(PaymentMethodKind::Ewallet),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported payment method: {}", value),
                field: Some("method".to_string()),
            }),
        }
    }
}

/// Authoritative state of a payment attempt.
///
/// `Pending` is the only open state and nothing returns to it. A confirmed
/// payment outranks an expiry or failure, so `Expired`/`Failed` may still
/// move to `Paid`/`Settled`; otherwise the only later move is `Paid -> Settled`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Settled,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Settled => "settled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    /// Map a raw gateway status string. Unknown values stay `Pending` so a
    /// new provider state never finalizes an attempt by accident.
    pub fn from_provider(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            // A closed single-use virtual account turns INACTIVE once it is
            // paid, so the account state alone never finalizes an attempt.
            "PENDING" | "ACTIVE" | "INACTIVE" => PaymentStatus::Pending,
            "PAID" | "COMPLETED" | "SUCCEEDED" | "CAPTURED" => PaymentStatus::Paid,
            "SETTLED" => PaymentStatus::Settled,
            "FAILED" | "VOIDED" => PaymentStatus::Failed,
            "EXPIRED" => PaymentStatus::Expired,
            other => {
                warn!(raw_status = %other, "Unknown provider status, treating as pending");
                PaymentStatus::Pending
            }
        }
    }

    pub fn is_money_received(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Settled)
    }

    /// Whether an attempt in `self` may be moved to `next`. Same-state
    /// repeats are accepted so duplicate deliveries still refresh the audit
    /// payload.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        *self == next
            || *self == PaymentStatus::Pending
            || (*self == PaymentStatus::Paid && next == PaymentStatus::Settled)
            || (matches!(self, PaymentStatus::Failed | PaymentStatus::Expired)
                && next.is_money_received())
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "settled" => Ok(PaymentStatus::Settled),
            "failed" => Ok(PaymentStatus::Failed),
            "expired" => Ok(PaymentStatus::Expired),
            _ => Err(PaymentError::ValidationError {
                message: format!("unknown payment status: {}", value),
                field: Some("status".to_string()),
            }),
        }
    }
}

/// Method-specific part of a charge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeChannel {
    Qris,
    VirtualAccount {
        bank_code: String,
    },
    Ewallet {
        wallet_type: String,
        success_url: String,
        failure_url: String,
    },
}

impl ChargeChannel {
    pub fn method(&self) -> PaymentMethodKind {
        match self {
            ChargeChannel::Qris => PaymentMethodKind::Qris,
            ChargeChannel::VirtualAccount { .. } => PaymentMethodKind::VirtualAccount,
            ChargeChannel::Ewallet { .. } => PaymentMethodKind::Ewallet,
        }
    }

    /// Bank code, wallet code, or `QRIS`
    pub fn channel_code(&self) -> &str {
        match self {
            ChargeChannel::Qris => "QRIS",
            ChargeChannel::VirtualAccount { bank_code } => bank_code,
            ChargeChannel::Ewallet { wallet_type, .. } => wallet_type,
        }
    }
}

/// Validated request handed to the payment provider
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub reference_id: String,
    /// Whole rupiah
    pub amount: BigDecimal,
    pub customer_name: String,
    pub channel: ChargeChannel,
}

/// What the customer needs to complete the payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChargeDisplay {
    Qris {
        qr_string: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<String>,
    },
    VirtualAccount {
        account_number: String,
        bank_code: String,
        bank_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        expires_at: Option<String>,
    },
    Ewallet {
        redirect_url: Option<String>,
        wallet_type: String,
    },
}

/// Successful charge creation at the gateway
#[derive(Debug, Clone)]
pub struct ProviderChargeResult {
    pub provider_payment_id: String,
    /// Status string exactly as the gateway sent it
    pub raw_status: String,
    pub status: PaymentStatus,
    pub display: ChargeDisplay,
    pub raw_response: JsonValue,
}

/// Current state of a charge as reported by the gateway
#[derive(Debug, Clone)]
pub struct ProviderStatusResult {
    pub provider_payment_id: String,
    pub raw_status: String,
    pub status: PaymentStatus,
    pub paid_amount: Option<BigDecimal>,
    pub raw_response: JsonValue,
}

/// Display name for a virtual-account bank code; unknown codes are echoed
pub fn bank_name(bank_code: &str) -> String {
    match bank_code {
        "BCA" => "Bank Central Asia",
        "BNI" => "Bank Negara Indonesia",
        "BRI" => "Bank Rakyat Indonesia",
        "MANDIRI" => "Bank Mandiri",
        "PERMATA" => "Bank Permata",
        "BSI" => "Bank Syariah Indonesia",
        "BJB" => "Bank BJB",
        "CIMB" => "CIMB Niaga",
        other => other,
    }
    .to_string()
}

/// Status change extracted from a gateway callback or a status poll
#[derive(Debug, Clone)]
pub struct ReconciliationEvent {
    pub external_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub raw_status: String,
    pub status: PaymentStatus,
    pub paid_amount: Option<BigDecimal>,
    pub payload: JsonValue,
}

/// Known Xendit callback shapes.
///
/// Callbacks are loosely typed JSON; each variant pulls only the fields the
/// reconciliation path needs and keeps the whole body for audit.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    /// Invoice (QRIS) callback, also the fallback for unrecognised bodies
    Invoice {
        id: Option<String>,
        external_id: Option<String>,
        status: Option<String>,
        paid_amount: Option<BigDecimal>,
    },
    /// Fixed virtual account payment; carries no status and means money received
    VirtualAccountPayment {
        callback_virtual_account_id: String,
        external_id: Option<String>,
        amount: Option<BigDecimal>,
    },
    /// E-wallet charge event wrapped in `{event, data}`
    EwalletCharge {
        event: Option<String>,
        id: Option<String>,
        reference_id: Option<String>,
        status: Option<String>,
        amount: Option<BigDecimal>,
    },
}

fn str_field(value: &JsonValue, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Amounts arrive as JSON numbers or numeric strings
pub fn amount_field(value: &JsonValue, key: &str) -> Option<BigDecimal> {
    match value.get(key)? {
        JsonValue::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        JsonValue::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

impl WebhookEvent {
    /// Classify a callback body. Returns `None` when the body is not a JSON object.
    pub fn from_json(payload: &JsonValue) -> Option<Self> {
        if !payload.is_object() {
            return None;
        }

        if let Some(data) = payload.get("data").filter(|d| d.is_object()) {
            if payload.get("event").is_some() {
                return Some(WebhookEvent::EwalletCharge {
                    event: str_field(payload, "event"),
                    id: str_field(data, "id"),
                    reference_id: str_field(data, "reference_id"),
                    status: str_field(data, "status"),
                    amount: amount_field(data, "capture_amount")
                        .or_else(|| amount_field(data, "charge_amount")),
                });
            }
        }

        if payload.get("payment_id").is_some() && payload.get("status").is_none() {
            if let Some(callback_virtual_account_id) =
                str_field(payload, "callback_virtual_account_id")
            {
                return Some(WebhookEvent::VirtualAccountPayment {
                    callback_virtual_account_id,
                    external_id: str_field(payload, "external_id"),
                    amount: amount_field(payload, "amount"),
                });
            }
        }

        Some(WebhookEvent::Invoice {
            id: str_field(payload, "id"),
            external_id: str_field(payload, "external_id")
                .or_else(|| str_field(payload, "reference_id")),
            status: str_field(payload, "status"),
            paid_amount: amount_field(payload, "paid_amount")
                .or_else(|| amount_field(payload, "amount")),
        })
    }

    /// Normalize into the shape the reconciliation path applies
    pub fn into_reconciliation(self, payload: JsonValue) -> ReconciliationEvent {
        let (external_id, provider_payment_id, raw_status, paid_amount) = match self {
            WebhookEvent::Invoice {
                id,
                external_id,
                status,
                paid_amount,
            } => (external_id, id, status, paid_amount),
            WebhookEvent::VirtualAccountPayment {
                callback_virtual_account_id,
                external_id,
                amount,
            } => (
                external_id,
                Some(callback_virtual_account_id),
                Some("PAID".to_string()),
                amount,
            ),
            WebhookEvent::EwalletCharge {
                id,
                reference_id,
                status,
                amount,
                ..
            } => (reference_id, id, status, amount),
        };

        let raw_status = raw_status.unwrap_or_else(|| "PENDING".to_string());
        ReconciliationEvent {
            external_id,
            provider_payment_id,
            status: PaymentStatus::from_provider(&raw_status),
            raw_status,
            paid_amount,
            payload,
        }
    }
}
