use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::signal;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::{error, info};

use vtuflow_backend::api::{self, AppState};
use vtuflow_backend::config::AppConfig;
use vtuflow_backend::database::account_repository::AccountRepository;
use vtuflow_backend::database::app_settings_repository::AppSettingsRepository;
use vtuflow_backend::database::transaction_repository::TransactionRepository;
use vtuflow_backend::database::user_repository::UserRepository;
use vtuflow_backend::database::init_pool_from_config;
use vtuflow_backend::health::HealthChecker;
use vtuflow_backend::logging::init_tracing;
use vtuflow_backend::middleware::logging::{request_logging_middleware, UuidRequestId};
use vtuflow_backend::payments::provider::PaymentProvider;
use vtuflow_backend::payments::providers::paystack::PaystackProvider;
use vtuflow_backend::services::accounts::VirtualAccountService;
use vtuflow_backend::services::settlement::SettlementEngine;
use vtuflow_backend::services::webhook_processor::WebhookProcessor;
use vtuflow_backend::vending::factory::VendingProviderFactory;
use vtuflow_backend::workers::requery::{RequeryWorker, RequeryWorkerConfig};
use vtuflow_backend::workers::webhook_retry::WebhookRetryWorker;

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install signal handler"),
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

async fn shutdown_signal_with_notify(shutdown_tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = shutdown_tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenv().ok();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        "Starting VTU settlement backend"
    );

    let config = AppConfig::from_env()?;
    config.validate()?;

    info!("Initializing database connection pool...");
    let db_pool = init_pool_from_config(&config.database).await.map_err(|e| {
        error!("Failed to initialize database pool: {}", e);
        anyhow::anyhow!(e)
    })?;
    info!(
        max_connections = config.database.max_connections,
        "Database connection pool initialized"
    );

    let payment_provider: Arc<dyn PaymentProvider> = Arc::new(
        PaystackProvider::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );
    info!(provider = payment_provider.name().as_str(), "Payment provider initialized");

    let vending = Arc::new(
        VendingProviderFactory::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?,
    );

    let engine = Arc::new(SettlementEngine::new(db_pool.clone(), vending.clone()));
    let webhook_processor = Arc::new(WebhookProcessor::new(
        db_pool.clone(),
        payment_provider.clone(),
    ));
    let account_service = Arc::new(VirtualAccountService::new(
        AccountRepository::new(db_pool.clone()),
        UserRepository::new(db_pool.clone()),
        payment_provider.clone(),
    ));

    let (worker_shutdown_tx, worker_shutdown_rx) = watch::channel(false);

    let requery_worker = RequeryWorker::new(
        engine.clone(),
        TransactionRepository::new(db_pool.clone()),
        RequeryWorkerConfig::from_settlement(&config.settlement),
    );
    let requery_handle = tokio::spawn(requery_worker.run(worker_shutdown_rx.clone()));

    let retry_worker = WebhookRetryWorker::new(
        webhook_processor.clone(),
        config.settlement.webhook_retry_interval,
    );
    let retry_handle = tokio::spawn(retry_worker.run(worker_shutdown_rx));

    let state = AppState {
        engine,
        webhook_processor,
        account_service,
        user_repo: UserRepository::new(db_pool.clone()),
        transaction_repo: TransactionRepository::new(db_pool.clone()),
        settings_repo: AppSettingsRepository::new(db_pool.clone()),
        health_checker: HealthChecker::new(db_pool),
    };

    let app = api::router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(axum::middleware::from_fn(request_logging_middleware))
            .layer(PropagateRequestIdLayer::x_request_id()),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to address {}: {}", addr, e);
        e
    })?;

    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_notify(worker_shutdown_tx.clone()))
        .await?;

    let _ = worker_shutdown_tx.send(true);
    for (name, handle) in [("requery", requery_handle), ("webhook_retry", retry_handle)] {
        if tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .is_err()
        {
            error!(worker = name, "Timed out waiting for worker shutdown");
        }
    }

    info!("Server shutdown complete");

    Ok(())
}
