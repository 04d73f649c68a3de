//! POST /api/accounts/{user_id}

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::database::account_repository::VirtualAccount;
use crate::error::AppError;

use super::AppState;

/// Provision (or return) the user's dedicated funding account.
pub async fn provision_account(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<VirtualAccount>, AppError> {
    let account = state.account_service.get_or_provision(user_id).await?;
    Ok(Json(account))
}
