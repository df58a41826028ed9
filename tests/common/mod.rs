#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use pos_backend::config::CheckoutConfig;
use pos_backend::database::error::{DatabaseError, DatabaseErrorKind};
use pos_backend::database::memory::{InMemoryOrderStore, InMemoryPaymentAttemptStore};
use pos_backend::database::order_repository::Order;
use pos_backend::database::payment_attempt_repository::{
    NewPaymentAttempt, PaymentAttempt, PaymentAttemptStore, StatusUpdate, StatusUpdateResult,
};
use pos_backend::payments::error::{PaymentError, PaymentResult};
use pos_backend::payments::provider::PaymentProvider;
use pos_backend::payments::types::{
    ChargeChannel, ChargeDisplay, ChargeRequest, PaymentMethodKind, PaymentStatus,
    ProviderChargeResult, ProviderStatusResult,
};
use pos_backend::services::{ChargeService, ReconciliationService, WebhookProcessor};
use serde_json::json;
use std::sync::{Arc, Mutex};

pub const CALLBACK_TOKEN: &str = "test-callback-token";
pub const JWT_SECRET: &str = "test-jwt-secret";

/// Gateway double that answers from a script and records what it was sent
pub struct ScriptedProvider {
    reject: Option<(u16, String)>,
    remote_status: Mutex<String>,
    pub requests: Mutex<Vec<ChargeRequest>>,
}

impl ScriptedProvider {
    pub fn accepting() -> Self {
        Self {
            reject: None,
            remote_status: Mutex::new("PENDING".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting(http_status: u16, body: &str) -> Self {
        Self {
            reject: Some((http_status, body.to_string())),
            ..Self::accepting()
        }
    }

    pub fn set_remote_status(&self, status: &str) {
        *self.remote_status.lock().unwrap() = status.to_string();
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<ProviderChargeResult> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some((status, body)) = &self.reject {
            return Err(PaymentError::ProviderError {
                provider: "xendit".to_string(),
                message: format!("Xendit returned HTTP {}", status),
                http_status: Some(*status),
                raw_body: Some(body.clone()),
            });
        }

        let provider_payment_id = format!("prov_{}", request.reference_id);
        let display = match &request.channel {
            ChargeChannel::Qris => ChargeDisplay::Qris {
                qr_string: format!("https://checkout.example/{}", provider_payment_id),
                expires_at: None,
            },
            ChargeChannel::VirtualAccount { bank_code } => ChargeDisplay::VirtualAccount {
                account_number: "8808999912345678".to_string(),
                bank_code: bank_code.clone(),
                bank_name: pos_backend::payments::types::bank_name(bank_code),
                expires_at: None,
            },
            ChargeChannel::Ewallet { wallet_type, .. } => ChargeDisplay::Ewallet {
                redirect_url: Some(format!("https://wallet.example/{}", provider_payment_id)),
                wallet_type: wallet_type.clone(),
            },
        };

        Ok(ProviderChargeResult {
            provider_payment_id: provider_payment_id.clone(),
            raw_status: "PENDING".to_string(),
            status: PaymentStatus::Pending,
            display,
            raw_response: json!({ "id": provider_payment_id, "status": "PENDING" }),
        })
    }

    async fn get_charge_status(
        &self,
        _method: PaymentMethodKind,
        provider_payment_id: &str,
    ) -> PaymentResult<ProviderStatusResult> {
        let raw_status = self.remote_status.lock().unwrap().clone();
        let status = PaymentStatus::from_provider(&raw_status);
        Ok(ProviderStatusResult {
            provider_payment_id: provider_payment_id.to_string(),
            paid_amount: status
                .is_money_received()
                .then(|| BigDecimal::from(50_000)),
            raw_response: json!({ "id": provider_payment_id, "status": raw_status }),
            raw_status,
            status,
        })
    }

    fn name(&self) -> &'static str {
        "xendit"
    }
}

/// Store whose writes always fail, as if the database went away mid-request
pub struct FailingStore;

fn unavailable() -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::ConnectionError, "connection refused")
}

#[async_trait]
impl PaymentAttemptStore for FailingStore {
    async fn create(&self, _attempt: NewPaymentAttempt) -> Result<PaymentAttempt, DatabaseError> {
        Err(unavailable())
    }

    async fn find_by_reference_or_provider_id(
        &self,
        _reference_id: Option<&str>,
        _provider_payment_id: Option<&str>,
    ) -> Result<Option<PaymentAttempt>, DatabaseError> {
        Err(unavailable())
    }

    async fn update_status(
        &self,
        _update: &StatusUpdate,
    ) -> Result<StatusUpdateResult, DatabaseError> {
        Err(unavailable())
    }
}

pub struct Harness {
    pub provider: Arc<ScriptedProvider>,
    pub attempts: InMemoryPaymentAttemptStore,
    pub orders: InMemoryOrderStore,
    pub charges: Arc<ChargeService>,
    pub processor: Arc<WebhookProcessor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_provider(ScriptedProvider::accepting())
    }

    pub fn with_provider(provider: ScriptedProvider) -> Self {
        let provider = Arc::new(provider);
        let attempts = InMemoryPaymentAttemptStore::new();
        let orders = InMemoryOrderStore::new();
        let reconciliation = Arc::new(ReconciliationService::new(
            Arc::new(attempts.clone()),
            Arc::new(orders.clone()),
        ));
        let charges = Arc::new(ChargeService::new(
            provider.clone(),
            Arc::new(attempts.clone()),
            reconciliation.clone(),
            CheckoutConfig::default(),
        ));
        let processor = Arc::new(WebhookProcessor::new(CALLBACK_TOKEN, reconciliation));

        Self {
            provider,
            attempts,
            orders,
            charges,
            processor,
        }
    }

    pub async fn seed_order(&self, id: i64) {
        self.orders
            .insert(Order {
                id,
                status: "pending".to_string(),
                payment_verified: false,
            })
            .await;
    }

    /// Store a pending attempt directly, bypassing the gateway
    pub async fn seed_attempt(
        &self,
        reference_id: &str,
        provider_payment_id: &str,
        amount: i64,
        order_id: Option<i64>,
    ) -> PaymentAttempt {
        self.attempts
            .create(NewPaymentAttempt {
                reference_id: reference_id.to_string(),
                provider_payment_id: Some(provider_payment_id.to_string()),
                method: PaymentMethodKind::Qris,
                channel_code: "QRIS".to_string(),
                channel_id: "pos_main".to_string(),
                amount: BigDecimal::from(amount),
                status: PaymentStatus::Pending,
                order_id,
                customer_name: "Customer".to_string(),
                provider_payload: json!({ "id": provider_payment_id }),
            })
            .await
            .expect("seed attempt")
    }
}

pub fn bearer_token() -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use pos_backend::middleware::auth::Claims;

    let claims = Claims {
        sub: "cashier-1".to_string(),
        exp: chrono::Utc::now().timestamp() + 3600,
        role: Some("cashier".to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("encode token")
}
