//! Xendit integration: QRIS invoices, fixed virtual accounts and e-wallet charges.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    amount_field, bank_name, ChargeChannel, ChargeDisplay, ChargeRequest, PaymentMethodKind,
    PaymentStatus, ProviderChargeResult, ProviderStatusResult,
};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use bigdecimal::{BigDecimal, ToPrimitive};
use reqwest::Method;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use tracing::info;

pub const PROVIDER_NAME: &str = "xendit";
pub const DEFAULT_BASE_URL: &str = "https://api.xendit.co";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const PAYER_EMAIL: &str = "customer@pos-system.com";
const INVOICE_DURATION_SECS: u64 = 86_400;

#[derive(Clone)]
pub struct XenditConfig {
    pub api_key: String,
    /// Shared secret Xendit sends in `x-callback-token`
    pub webhook_token: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for XenditConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XenditConfig")
            .field("api_key", &"<redacted>")
            .field("webhook_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl XenditConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let required = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .ok_or(PaymentError::ValidationError {
                    message: format!("{} environment variable is required", name),
                    field: Some(name.to_string()),
                })
        };

        Ok(Self {
            api_key: required("XENDIT_API_KEY")?,
            webhook_token: required("XENDIT_WEBHOOK_TOKEN")?,
            base_url: std::env::var("XENDIT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout_secs: std::env::var("XENDIT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        })
    }
}

pub struct XenditProvider {
    config: XenditConfig,
    http: PaymentHttpClient,
}

impl XenditProvider {
    pub fn new(config: XenditConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(PROVIDER_NAME, Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(XenditConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post(
        &self,
        path: &str,
        body: &JsonValue,
        operation: &str,
    ) -> PaymentResult<JsonValue> {
        self.http
            .request_json(
                Method::POST,
                &self.endpoint(path),
                &self.config.api_key,
                Some(body),
                operation,
            )
            .await
    }

    async fn get(&self, path: &str, operation: &str) -> PaymentResult<JsonValue> {
        self.http
            .request_json(
                Method::GET,
                &self.endpoint(path),
                &self.config.api_key,
                None,
                operation,
            )
            .await
    }

    /// Xendit takes integral rupiah
    fn whole_amount(amount: &BigDecimal) -> PaymentResult<i64> {
        if !amount.is_integer() {
            return Err(PaymentError::ValidationError {
                message: "amount must be a whole number of rupiah".to_string(),
                field: Some("amount".to_string()),
            });
        }
        amount.to_i64().ok_or(PaymentError::ValidationError {
            message: "amount is out of range".to_string(),
            field: Some("amount".to_string()),
        })
    }

    fn required_str(response: &JsonValue, key: &str) -> PaymentResult<String> {
        response
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| PaymentError::ProviderError {
                provider: PROVIDER_NAME.to_string(),
                message: format!("response is missing '{}'", key),
                http_status: None,
                raw_body: Some(response.to_string()),
            })
    }

    fn optional_str(response: &JsonValue, key: &str) -> Option<String> {
        response
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    fn raw_status(response: &JsonValue) -> String {
        Self::optional_str(response, "status").unwrap_or_else(|| "PENDING".to_string())
    }

    pub fn invoice_body(request: &ChargeRequest, amount: i64) -> JsonValue {
        json!({
            "external_id": request.reference_id,
            "amount": amount,
            "payer_email": PAYER_EMAIL,
            "description": format!("Payment for order {}", request.reference_id),
            "invoice_duration": INVOICE_DURATION_SECS,
            "currency": "IDR",
            "payment_methods": ["QRIS"],
        })
    }

    pub fn virtual_account_body(
        request: &ChargeRequest,
        bank_code: &str,
        amount: i64,
    ) -> JsonValue {
        json!({
            "external_id": request.reference_id,
            "bank_code": bank_code,
            "name": request.customer_name,
            "expected_amount": amount,
            "is_closed": true,
            "is_single_use": true,
        })
    }

    pub fn ewallet_body(
        request: &ChargeRequest,
        wallet_type: &str,
        success_url: &str,
        failure_url: &str,
        amount: i64,
    ) -> JsonValue {
        json!({
            "reference_id": request.reference_id,
            "currency": "IDR",
            "amount": amount,
            "checkout_method": "ONE_TIME_PAYMENT",
            "channel_code": wallet_type,
            "channel_properties": {
                "success_redirect_url": success_url,
                "failure_redirect_url": failure_url,
            },
        })
    }

    fn ewallet_redirect_url(response: &JsonValue) -> Option<String> {
        let actions = response.get("actions")?;
        ["desktop_web_checkout_url", "mobile_web_checkout_url", "checkout_url"]
            .iter()
            .find_map(|key| Self::optional_str(actions, key))
    }
}

#[async_trait]
impl PaymentProvider for XenditProvider {
    async fn create_charge(&self, request: ChargeRequest) -> PaymentResult<ProviderChargeResult> {
        let amount = Self::whole_amount(&request.amount)?;

        let response = match &request.channel {
            ChargeChannel::Qris => {
                let body = Self::invoice_body(&request, amount);
                self.post("/v2/invoices", &body, "create_invoice").await?
            }
            ChargeChannel::VirtualAccount { bank_code } => {
                let body = Self::virtual_account_body(&request, bank_code, amount);
                self.post("/callback_virtual_accounts", &body, "create_virtual_account")
                    .await?
            }
            ChargeChannel::Ewallet {
                wallet_type,
                success_url,
                failure_url,
            } => {
                let body =
                    Self::ewallet_body(&request, wallet_type, success_url, failure_url, amount);
                self.post("/ewallets/charges", &body, "create_ewallet_charge")
                    .await?
            }
        };

        let provider_payment_id = Self::required_str(&response, "id")?;
        let display = match &request.channel {
            ChargeChannel::Qris => ChargeDisplay::Qris {
                qr_string: Self::required_str(&response, "invoice_url")?,
                expires_at: Self::optional_str(&response, "expiry_date"),
            },
            ChargeChannel::VirtualAccount { bank_code } => ChargeDisplay::VirtualAccount {
                account_number: Self::required_str(&response, "account_number")?,
                bank_code: bank_code.clone(),
                bank_name: bank_name(bank_code),
                expires_at: Self::optional_str(&response, "expiration_date"),
            },
            ChargeChannel::Ewallet { wallet_type, .. } => ChargeDisplay::Ewallet {
                redirect_url: Self::ewallet_redirect_url(&response),
                wallet_type: wallet_type.clone(),
            },
        };

        let raw_status = Self::raw_status(&response);
        info!(
            provider = PROVIDER_NAME,
            method = %request.channel.method(),
            reference_id = %request.reference_id,
            provider_payment_id = %provider_payment_id,
            raw_status = %raw_status,
            "Xendit charge created"
        );

        Ok(ProviderChargeResult {
            provider_payment_id,
            status: PaymentStatus::from_provider(&raw_status),
            raw_status,
            display,
            raw_response: response,
        })
    }

    async fn get_charge_status(
        &self,
        method: PaymentMethodKind,
        provider_payment_id: &str,
    ) -> PaymentResult<ProviderStatusResult> {
        if provider_payment_id.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "provider payment id is required".to_string(),
                field: Some("provider_payment_id".to_string()),
            });
        }

        let (path, operation) = match method {
            PaymentMethodKind::Qris => (
                format!("/v2/invoices/{}", provider_payment_id),
                "get_invoice",
            ),
            PaymentMethodKind::VirtualAccount => (
                format!("/callback_virtual_accounts/{}", provider_payment_id),
                "get_virtual_account",
            ),
            PaymentMethodKind::Ewallet => (
                format!("/ewallets/charges/{}", provider_payment_id),
                "get_ewallet_charge",
            ),
        };
        let response = self.get(&path, operation).await?;

        let paid_amount = match method {
            PaymentMethodKind::Qris => amount_field(&response, "paid_amount"),
            PaymentMethodKind::VirtualAccount => None,
            PaymentMethodKind::Ewallet => amount_field(&response, "capture_amount")
                .or_else(|| amount_field(&response, "charge_amount")),
        };
        let raw_status = Self::raw_status(&response);
        // The account endpoint reports ACTIVE/INACTIVE for the account itself,
        // not whether money arrived; only the payment callback settles a VA.
        let status = match method {
            PaymentMethodKind::VirtualAccount => PaymentStatus::Pending,
            _ => PaymentStatus::from_provider(&raw_status),
        };

        Ok(ProviderStatusResult {
            provider_payment_id: Self::optional_str(&response, "id")
                .unwrap_or_else(|| provider_payment_id.to_string()),
            status,
            raw_status,
            paid_amount,
            raw_response: response,
        })
    }

    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Path,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Json, Router,
    };

    async fn spawn_gateway(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake gateway");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{}", addr)
    }

    fn provider(base_url: String) -> XenditProvider {
        XenditProvider::new(XenditConfig {
            api_key: "xnd_development_key".to_string(),
            webhook_token: "callback-token".to_string(),
            base_url,
            timeout_secs: 5,
        })
        .expect("provider init should succeed")
    }

    fn request(channel: ChargeChannel) -> ChargeRequest {
        ChargeRequest {
            reference_id: "qris_QRIS_1700000000000000000".to_string(),
            amount: BigDecimal::from(50_000),
            customer_name: "Budi".to_string(),
            channel,
        }
    }

    fn fake_gateway() -> Router {
        Router::new()
            .route(
                "/v2/invoices",
                post(|headers: HeaderMap, Json(body): Json<JsonValue>| async move {
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .is_some_and(|v| v.starts_with("Basic "));
                    if !authorized || body["payment_methods"][0] != "QRIS" {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"error_code": "INVALID_API_KEY"})),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": "inv_1",
                            "external_id": body["external_id"],
                            "status": "PENDING",
                            "invoice_url": "https://pay/inv_1",
                            "expiry_date": "2026-10-17T00:00:00.000Z"
                        })),
                    )
                }),
            )
            .route(
                "/callback_virtual_accounts",
                post(|Json(body): Json<JsonValue>| async move {
                    if body["expected_amount"] != 150_000 {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(json!({
                                "error_code": "API_VALIDATION_ERROR",
                                "message": "expected_amount"
                            })),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": "cva_1",
                            "status": "PENDING",
                            "account_number": "9999123456",
                            "bank_code": body["bank_code"]
                        })),
                    )
                }),
            )
            .route(
                "/ewallets/charges",
                post(|Json(body): Json<JsonValue>| async move {
                    assert_eq!(body["checkout_method"], "ONE_TIME_PAYMENT");
                    (
                        StatusCode::ACCEPTED,
                        Json(json!({
                            "id": "ewc_1",
                            "status": "PENDING",
                            "actions": {"mobile_web_checkout_url": "https://ovo/checkout"}
                        })),
                    )
                }),
            )
            .route(
                "/callback_virtual_accounts/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"id": id, "status": "INACTIVE", "expected_amount": 150000}))
                }),
            )
            .route(
                "/v2/invoices/{id}",
                get(|Path(id): Path<String>| async move {
                    Json(json!({"id": id, "status": "SETTLED", "paid_amount": 50000}))
                }),
            )
    }

    #[tokio::test]
    async fn creates_qris_invoice() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let result = provider(base_url)
            .create_charge(request(ChargeChannel::Qris))
            .await
            .expect("invoice should be created");

        assert_eq!(result.provider_payment_id, "inv_1");
        assert_eq!(result.status, PaymentStatus::Pending);
        assert_eq!(
            result.display,
            ChargeDisplay::Qris {
                qr_string: "https://pay/inv_1".to_string(),
                expires_at: Some("2026-10-17T00:00:00.000Z".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn non_2xx_surfaces_raw_body() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let err = provider(base_url)
            .create_charge(request(ChargeChannel::VirtualAccount {
                bank_code: "BCA".to_string(),
            }))
            .await
            .expect_err("gateway rejects the amount");

        match err {
            PaymentError::ProviderError {
                http_status,
                raw_body,
                ..
            } => {
                assert_eq!(http_status, Some(400));
                assert!(raw_body.unwrap().contains("API_VALIDATION_ERROR"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn creates_virtual_account_with_bank_name() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let mut charge = request(ChargeChannel::VirtualAccount {
            bank_code: "MANDIRI".to_string(),
        });
        charge.amount = BigDecimal::from(150_000);

        let result = provider(base_url).create_charge(charge).await.unwrap();
        match result.display {
            ChargeDisplay::VirtualAccount {
                account_number,
                bank_name,
                ..
            } => {
                assert_eq!(account_number, "9999123456");
                assert_eq!(bank_name, "Bank Mandiri");
            }
            other => panic!("unexpected display: {:?}", other),
        }
    }

    #[tokio::test]
    async fn ewallet_redirect_falls_back_to_mobile_url() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let result = provider(base_url)
            .create_charge(request(ChargeChannel::Ewallet {
                wallet_type: "ID_OVO".to_string(),
                success_url: "https://pos/ok".to_string(),
                failure_url: "https://pos/fail".to_string(),
            }))
            .await
            .unwrap();

        assert_eq!(
            result.display,
            ChargeDisplay::Ewallet {
                redirect_url: Some("https://ovo/checkout".to_string()),
                wallet_type: "ID_OVO".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn fetches_invoice_status() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let status = provider(base_url)
            .get_charge_status(PaymentMethodKind::Qris, "inv_1")
            .await
            .unwrap();

        assert_eq!(status.status, PaymentStatus::Settled);
        assert_eq!(status.paid_amount, Some(BigDecimal::from(50_000)));
    }

    #[tokio::test]
    async fn inactive_virtual_account_stays_pending() {
        let base_url = spawn_gateway(fake_gateway()).await;
        let status = provider(base_url)
            .get_charge_status(PaymentMethodKind::VirtualAccount, "cva_1")
            .await
            .unwrap();

        assert_eq!(status.raw_status, "INACTIVE");
        assert_eq!(status.status, PaymentStatus::Pending);
        assert_eq!(status.paid_amount, None);
    }

    #[tokio::test]
    async fn unreachable_gateway_is_a_network_error() {
        let err = provider("http://127.0.0.1:1".to_string())
            .create_charge(request(ChargeChannel::Qris))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NetworkError { .. }));
    }

    #[test]
    fn fractional_amounts_are_rejected() {
        let amount = BigDecimal::from(1000) / BigDecimal::from(3);
        assert!(XenditProvider::whole_amount(&amount).is_err());
        assert_eq!(
            XenditProvider::whole_amount(&BigDecimal::from(50_000)).unwrap(),
            50_000
        );
    }
}
