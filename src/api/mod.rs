//! HTTP surface: purchase, wallet, accounts, webhooks and admin routes.

pub mod accounts;
pub mod admin;
pub mod purchase;
pub mod wallet;
pub mod webhooks;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::database::app_settings_repository::AppSettingsRepository;
use crate::database::transaction_repository::TransactionRepository;
use crate::database::user_repository::UserRepository;
use crate::health::HealthChecker;
use crate::services::accounts::VirtualAccountService;
use crate::services::settlement::SettlementEngine;
use crate::services::webhook_processor::WebhookProcessor;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SettlementEngine>,
    pub webhook_processor: Arc<WebhookProcessor>,
    pub account_service: Arc<VirtualAccountService>,
    pub user_repo: UserRepository,
    pub transaction_repo: TransactionRepository,
    pub settings_repo: AppSettingsRepository,
    pub health_checker: HealthChecker,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(health))
        .route("/health/live", get(liveness))
        .route("/api/purchase", post(purchase::handle_purchase))
        .route("/api/wallet/{user_id}", get(wallet::get_wallet))
        .route(
            "/api/accounts/{user_id}",
            post(accounts::provision_account),
        )
        .route("/webhooks/{provider}", post(webhooks::handle_webhook))
        .route("/api/admin/settings", get(admin::get_settings))
        .route("/api/admin/settings", patch(admin::update_settings))
        .route(
            "/api/admin/transactions/{tx_ref}/refund",
            post(admin::refund_transaction),
        )
        .route(
            "/api/admin/transactions/{tx_ref}/requery",
            post(admin::requery_transaction),
        )
        .with_state(state)
}

async fn health(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<axum::Json<crate::health::HealthStatus>, (axum::http::StatusCode, String)> {
    let status = state.health_checker.check_health().await;
    if status.is_healthy() {
        Ok(axum::Json(status))
    } else {
        Err((
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "Service Unavailable".to_string(),
        ))
    }
}

async fn liveness() -> &'static str {
    "OK"
}
