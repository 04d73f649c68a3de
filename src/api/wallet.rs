//! GET /api/wallet/{user_id}

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::transaction_repository::Transaction;
use crate::error::{AppError, DomainError};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct WalletQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WalletResponse {
    pub user_id: Uuid,
    pub balance: BigDecimal,
    pub transactions: Vec<Transaction>,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<WalletQuery>,
) -> Result<Json<WalletResponse>, AppError> {
    let balance = state.user_repo.get_balance(user_id).await.map_err(|e| {
        if matches!(e, DatabaseError::NotFound { .. }) {
            AppError::domain(DomainError::UserNotFound {
                user_id: user_id.to_string(),
            })
        } else {
            e.into()
        }
    })?;

    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let transactions = state
        .transaction_repo
        .find_recent_by_user(user_id, limit)
        .await?;

    Ok(Json(WalletResponse {
        user_id,
        balance,
        transactions,
    }))
}
