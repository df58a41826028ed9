pub mod payments;
pub mod webhooks;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::middleware::auth::{require_bearer, JwtVerifier};
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::charge::ChargeService;
use crate::services::webhook_processor::WebhookProcessor;

/// Payment and webhook routes with request-id and logging layers.
///
/// Merchant routes require a bearer token; the webhook route authenticates
/// with the gateway's callback token instead.
pub fn router(
    charges: Arc<ChargeService>,
    processor: Arc<WebhookProcessor>,
    verifier: Arc<JwtVerifier>,
) -> Router {
    let payment_routes = Router::new()
        .route(
            "/api/payments/xendit/qris",
            post(payments::create_qris_payment),
        )
        .route(
            "/api/payments/xendit/virtual-account",
            post(payments::create_virtual_account_payment),
        )
        .route(
            "/api/payments/xendit/ewallet",
            post(payments::create_ewallet_payment),
        )
        .route("/api/payments/xendit/{id}", get(payments::get_payment))
        .route(
            "/api/payments/xendit/{id}/sync",
            post(payments::sync_payment),
        )
        .route_layer(from_fn_with_state(verifier, require_bearer))
        .with_state(payments::PaymentsState { charges });

    let webhook_routes = Router::new()
        .route(
            "/api/webhooks/xendit",
            post(webhooks::handle_xendit_webhook),
        )
        .with_state(Arc::new(webhooks::WebhookState { processor }));

    Router::new()
        .merge(payment_routes)
        .merge(webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
