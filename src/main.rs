use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use storefront_payments::app::{AppState, Repositories};
use storefront_payments::config::Config;
use storefront_payments::middleware::RequestId;
use storefront_payments::modules::orders::{
    EnrollmentApiClient, EntitlementApiClient, ProductFulfillment,
};
use storefront_payments::modules::payments::services::FomopayQrClient;
use storefront_payments::modules::payments::ProcessorRegistry;

const DEFAULT_QR_TIMEOUT_SECS: u64 = 10;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    init_tracing(&config);

    tracing::info!(env = %config.app.env, "Starting storefront payments service");
    tracing::info!("Server binding to: {}", config.server.bind_address());

    // Create database connection pool
    let db_pool = config
        .database
        .create_pool()
        .await
        .context("Failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "Database pool initialized"
    );

    let registry = ProcessorRegistry::from_config(&config.payments);
    if registry.names().is_empty() {
        tracing::warn!("No payment processor configured");
    } else {
        tracing::info!(processors = ?registry.names(), "Payment processors registered");
    }

    let fomopay = config.payments.fomopay.as_ref();
    let qr_client = FomopayQrClient::new(
        fomopay.map(|fomopay| fomopay.api_url.clone()),
        Duration::from_secs(
            fomopay
                .map(|fomopay| fomopay.request_timeout_secs)
                .unwrap_or(DEFAULT_QR_TIMEOUT_SECS),
        ),
    )?;

    let fulfillment = ProductFulfillment::new(
        Arc::new(EnrollmentApiClient::new(&config.fulfillment)?),
        Arc::new(EntitlementApiClient::new(&config.fulfillment)?),
    );

    let state = AppState::new(
        Repositories::mysql(db_pool.clone()),
        registry,
        config.orders.generator(),
        config.checkout.clone(),
        Arc::new(fulfillment),
        Arc::new(qr_client),
        None,
    );

    // Start HTTP server
    let bind_address = config.server.bind_address();
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(RequestId)
            .wrap(TracingLogger::default())
            .app_data(actix_web::web::Data::new(db_pool.clone()))
            .configure(|cfg| state.configure(cfg))
    })
    .workers(config.server.workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    tracing::info!("Server started at http://{}", bind_address);

    server.await.context("HTTP server failed")
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storefront_payments=debug,actix_web=info".into());

    if config.app.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
