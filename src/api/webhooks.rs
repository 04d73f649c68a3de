//! POST /webhooks/{provider}
//!
//! The body is taken as raw bytes so the HMAC covers exactly what the
//! processor signed. Failures after signature verification still return 200;
//! the retry worker re-drives them from the event log.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{error, info, warn};

use crate::services::webhook_processor::WebhookProcessorError;

use super::AppState;

pub async fn handle_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    info!(provider = %provider, "Received webhook");

    let signature = match provider.as_str() {
        "paystack" => headers
            .get("x-paystack-signature")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        _ => None,
    };

    match state
        .webhook_processor
        .process_webhook(&provider, signature.as_deref(), &body)
        .await
    {
        Ok(_) => {
            info!(provider = %provider, "Webhook processed successfully");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(WebhookProcessorError::InvalidSignature) => {
            warn!(provider = %provider, "Invalid webhook signature");
            (StatusCode::UNAUTHORIZED, "Invalid signature").into_response()
        }
        Err(WebhookProcessorError::UnknownProvider(name)) => {
            warn!(provider = %name, "Unknown webhook provider");
            (StatusCode::NOT_FOUND, "Unknown provider").into_response()
        }
        Err(WebhookProcessorError::AlreadyProcessed) => {
            info!(provider = %provider, "Webhook already processed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
        Err(e) => {
            // Acknowledge so the processor stops redelivering; the event is
            // logged and the retry worker owns it now.
            error!(provider = %provider, error = %e, "Webhook processing failed");
            (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response()
        }
    }
}
