//! Dedicated virtual funding accounts, one per user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::error::{DatabaseError, DatabaseResult};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VirtualAccount {
    pub account_id: Uuid,
    pub user_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
    pub provider: String,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewVirtualAccount {
    pub user_id: Uuid,
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
    pub provider: String,
    pub provider_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> DatabaseResult<Option<VirtualAccount>> {
        let account = sqlx::query_as::<_, VirtualAccount>(
            r#"
            SELECT account_id, user_id, account_number, account_name, bank_name,
                   provider, provider_reference, created_at
            FROM virtual_accounts
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(account)
    }

    /// Resolve the owning account from the processor-side customer code
    /// carried on funding webhooks.
    pub async fn find_by_provider_reference(
        &self,
        provider_reference: &str,
    ) -> DatabaseResult<Option<VirtualAccount>> {
        let account = sqlx::query_as::<_, VirtualAccount>(
            r#"
            SELECT account_id, user_id, account_number, account_name, bank_name,
                   provider, provider_reference, created_at
            FROM virtual_accounts
            WHERE provider_reference = $1
            "#,
        )
        .bind(provider_reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(account)
    }

    /// Insert the provisioned account. The `user_id` unique constraint makes
    /// concurrent provisioning surface as `UniqueViolation`.
    pub async fn insert(&self, new: &NewVirtualAccount) -> DatabaseResult<VirtualAccount> {
        let account = sqlx::query_as::<_, VirtualAccount>(
            r#"
            INSERT INTO virtual_accounts
                (account_id, user_id, account_number, account_name, bank_name,
                 provider, provider_reference)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING account_id, user_id, account_number, account_name, bank_name,
                      provider, provider_reference, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.account_number)
        .bind(&new.account_name)
        .bind(&new.bank_name)
        .bind(&new.provider)
        .bind(&new.provider_reference)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(account)
    }
}
