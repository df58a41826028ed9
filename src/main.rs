use pos_backend::api;
use pos_backend::config::AppConfig;
use pos_backend::database::order_repository::{OrderRepository, OrderStore};
use pos_backend::database::payment_attempt_repository::{
    PaymentAttemptRepository, PaymentAttemptStore,
};
use pos_backend::database::{init_pool_from_config, run_migrations};
use pos_backend::health::{self, HealthChecker};
use pos_backend::logging::init_tracing;
use pos_backend::middleware::auth::JwtVerifier;
use pos_backend::payments::providers::xendit::{XenditConfig, XenditProvider};
use pos_backend::services::{ChargeService, ReconciliationService, WebhookProcessor};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    init_tracing(&config.logging);
    config.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting POS backend"
    );

    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!(error = %e, "Failed to initialize database pool");
        e
    })?;

    let run_schema = std::env::var("DB_RUN_MIGRATIONS")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if run_schema {
        run_migrations(&db_pool).await?;
    }

    let xendit_config = XenditConfig::from_env()?;
    info!(
        base_url = %xendit_config.base_url,
        timeout_secs = xendit_config.timeout_secs,
        "Xendit configuration loaded"
    );
    let webhook_token = xendit_config.webhook_token.clone();
    let provider = Arc::new(XenditProvider::new(xendit_config)?);

    let attempts: Arc<dyn PaymentAttemptStore> =
        Arc::new(PaymentAttemptRepository::new(db_pool.clone()));
    let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db_pool.clone()));
    let reconciliation = Arc::new(ReconciliationService::new(attempts.clone(), orders));

    let charges = Arc::new(ChargeService::new(
        provider,
        attempts,
        reconciliation.clone(),
        config.checkout.clone(),
    ));
    let processor = Arc::new(WebhookProcessor::new(webhook_token, reconciliation));
    let verifier = Arc::new(JwtVerifier::new(&config.auth.jwt_secret));

    let app = api::router(charges, processor, verifier)
        .merge(health::routes(HealthChecker::new(db_pool)));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!(address = %addr, error = %e, "Failed to bind");
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
