//! Admin routes: settings management, refunds and requeries.

use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::database::app_settings_repository::{AppSettings, AppSettingsUpdate};
use crate::database::transaction_repository::{Transaction, TransactionStatus};
use crate::error::{AppError, ValidationError};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SettingsUpdateRequest {
    pub maintenance_mode: Option<bool>,
    pub min_purchase: Option<String>,
    pub max_purchase: Option<String>,
    pub disabled_services: Option<Vec<String>>,
    pub referral_percent: Option<String>,
}

fn parse_decimal(value: &str, field: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(value.trim()).map_err(|_| {
        AppError::validation(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "not a valid decimal number".to_string(),
        })
    })
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<AppSettings>, AppError> {
    let settings = state.settings_repo.load().await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<SettingsUpdateRequest>,
) -> Result<Json<AppSettings>, AppError> {
    let update = AppSettingsUpdate {
        maintenance_mode: request.maintenance_mode,
        min_purchase: request
            .min_purchase
            .as_deref()
            .map(|v| parse_decimal(v, "min_purchase"))
            .transpose()?,
        max_purchase: request
            .max_purchase
            .as_deref()
            .map(|v| parse_decimal(v, "max_purchase"))
            .transpose()?,
        disabled_services: request.disabled_services,
        referral_percent: request
            .referral_percent
            .as_deref()
            .map(|v| parse_decimal(v, "referral_percent"))
            .transpose()?,
    };

    if let (Some(min), Some(max)) = (&update.min_purchase, &update.max_purchase) {
        if min > max {
            return Err(AppError::validation(ValidationError::InvalidField {
                field: "min_purchase".to_string(),
                reason: "min_purchase cannot exceed max_purchase".to_string(),
            }));
        }
    }

    let settings = state.settings_repo.update(&update).await?;
    Ok(Json(settings))
}

/// POST /api/admin/transactions/{tx_ref}/refund
pub async fn refund_transaction(
    State(state): State<AppState>,
    Path(tx_ref): Path<String>,
) -> Result<Json<Transaction>, AppError> {
    let refunded = state.engine.refund(&tx_ref).await?;
    Ok(Json(refunded))
}

#[derive(Debug, Serialize)]
pub struct RequeryResponse {
    pub tx_ref: String,
    pub status: TransactionStatus,
}

/// POST /api/admin/transactions/{tx_ref}/requery
pub async fn requery_transaction(
    State(state): State<AppState>,
    Path(tx_ref): Path<String>,
) -> Result<Json<RequeryResponse>, AppError> {
    let status = state.engine.requery(&tx_ref).await?;
    Ok(Json(RequeryResponse { tx_ref, status }))
}
