use crate::middleware::logging::log_external_call;
use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};

/// Thin JSON client shared by gateway integrations.
///
/// No retries: a failed charge creation is reported to the cashier, who
/// decides whether to try again.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    provider: String,
    timeout: Duration,
}

impl PaymentHttpClient {
    pub fn new(provider: &str, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                    timed_out: false,
                })?;

        Ok(Self {
            client,
            provider: provider.to_string(),
            timeout,
        })
    }

    /// Send a request and return the parsed JSON body of a 2xx answer.
    ///
    /// Non-2xx answers become `ProviderError` carrying the status and the
    /// untouched body text.
    pub async fn request_json(
        &self,
        method: reqwest::Method,
        url: &str,
        api_key: &str,
        body: Option<&JsonValue>,
        operation: &str,
    ) -> PaymentResult<JsonValue> {
        let started = Instant::now();
        // API key as username, empty password
        let mut request = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .basic_auth(api_key, Some(""));
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            log_external_call(&self.provider, operation, started.elapsed(), false);
            PaymentError::NetworkError {
                message: format!("provider request failed: {}", e),
                timed_out: e.is_timeout(),
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| PaymentError::NetworkError {
            message: format!("failed to read provider response: {}", e),
            timed_out: e.is_timeout(),
        })?;
        log_external_call(
            &self.provider,
            operation,
            started.elapsed(),
            status.is_success(),
        );

        if !status.is_success() {
            return Err(PaymentError::ProviderError {
                provider: self.provider.clone(),
                message: format!("HTTP {}", status.as_u16()),
                http_status: Some(status.as_u16()),
                raw_body: Some(text),
            });
        }

        serde_json::from_str::<JsonValue>(&text).map_err(|e| PaymentError::ProviderError {
            provider: self.provider.clone(),
            message: format!("invalid provider JSON response: {}", e),
            http_status: Some(status.as_u16()),
            raw_body: Some(text),
        })
    }
}

/// Constant-time comparison for shared secrets
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
