//! Merchant-facing payment endpoints. All routes sit behind bearer auth.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::HeaderMap,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::charge::{
    ChargeResponse, ChargeService, EwalletPaymentRequest, QrisPaymentRequest, SyncResponse,
    VirtualAccountPaymentRequest,
};

#[derive(Clone)]
pub struct PaymentsState {
    pub charges: Arc<ChargeService>,
}

fn tag(err: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(request_id) => err.with_request_id(request_id),
        None => err,
    }
}

fn body<T: DeserializeOwned>(
    payload: Result<Json<T>, JsonRejection>,
    headers: &HeaderMap,
) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tag(
            AppError::validation(ValidationError::MalformedBody {
                reason: rejection.body_text(),
            }),
            headers,
        )
    })
}

/// POST /api/payments/xendit/qris
pub async fn create_qris_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    payload: Result<Json<QrisPaymentRequest>, JsonRejection>,
) -> Result<Json<ChargeResponse>, AppError> {
    let request = body(payload, &headers)?;
    state
        .charges
        .create_qris_payment(request)
        .await
        .map(Json)
        .map_err(|e| tag(e, &headers))
}

/// POST /api/payments/xendit/virtual-account
pub async fn create_virtual_account_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    payload: Result<Json<VirtualAccountPaymentRequest>, JsonRejection>,
) -> Result<Json<ChargeResponse>, AppError> {
    let request = body(payload, &headers)?;
    state
        .charges
        .create_virtual_account_payment(request)
        .await
        .map(Json)
        .map_err(|e| tag(e, &headers))
}

/// POST /api/payments/xendit/ewallet
pub async fn create_ewallet_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    payload: Result<Json<EwalletPaymentRequest>, JsonRejection>,
) -> Result<Json<ChargeResponse>, AppError> {
    let request = body(payload, &headers)?;
    state
        .charges
        .create_ewallet_payment(request)
        .await
        .map(Json)
        .map_err(|e| tag(e, &headers))
}

/// GET /api/payments/xendit/{id}
pub async fn get_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payment = state
        .charges
        .get_payment(&id)
        .await
        .map_err(|e| tag(e, &headers))?;
    Ok(Json(json!({ "success": true, "payment": payment })))
}

/// POST /api/payments/xendit/{id}/sync
pub async fn sync_payment(
    State(state): State<PaymentsState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SyncResponse>, AppError> {
    state
        .charges
        .sync_payment(&id)
        .await
        .map(Json)
        .map_err(|e| tag(e, &headers))
}
