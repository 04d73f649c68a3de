//! User accounts: wallet balance, verification state and referral linkage.
//!
//! Balance mutations are associated functions taking `&mut PgConnection` so
//! they compose into a caller-owned transaction. The debit guard
//! (`balance >= amount`) is the single place that keeps balances from going
//! negative.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::error::{DatabaseError, DatabaseResult};

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub balance: BigDecimal,
    pub role: String,
    pub is_verified: bool,
    pub referred_by: Option<Uuid>,
    pub referral_bonus_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, email, first_name, last_name, phone, balance, role,
                   is_verified, referred_by, referral_bonus_paid, created_at, updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(user)
    }

    pub async fn get_balance(&self, user_id: Uuid) -> DatabaseResult<BigDecimal> {
        let row = sqlx::query_as::<_, (BigDecimal,)>(
            "SELECT balance FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(|(balance,)| balance)
            .ok_or_else(|| DatabaseError::not_found("user"))
    }

    /// Lock the user row for the duration of the enclosing transaction and
    /// return the current balance. `None` means the user does not exist.
    pub async fn lock_balance(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> DatabaseResult<Option<BigDecimal>> {
        let row = sqlx::query_as::<_, (BigDecimal,)>(
            "SELECT balance FROM users WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(balance,)| balance))
    }

    /// Guarded debit. Returns the new balance, or `None` when the guard
    /// rejected the update (insufficient funds or unknown user). Callers
    /// should have locked the row first so they can tell the two apart.
    pub async fn debit_balance(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> DatabaseResult<Option<BigDecimal>> {
        let row = sqlx::query_as::<_, (BigDecimal,)>(
            r#"
            UPDATE users
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|(balance,)| balance))
    }

    /// Credit the balance, returning the new value.
    pub async fn credit_balance(
        conn: &mut PgConnection,
        user_id: Uuid,
        amount: &BigDecimal,
    ) -> DatabaseResult<BigDecimal> {
        let row = sqlx::query_as::<_, (BigDecimal,)>(
            r#"
            UPDATE users
            SET balance = balance + $2, updated_at = NOW()
            WHERE user_id = $1
            RETURNING balance
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(|(balance,)| balance)
            .ok_or_else(|| DatabaseError::not_found("user"))
    }

    /// Fetch referral fields under a row lock so the bonus claim is atomic
    /// with the credit.
    pub async fn lock_referral_state(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> DatabaseResult<Option<(Option<Uuid>, bool)>> {
        let row = sqlx::query_as::<_, (Option<Uuid>, bool)>(
            "SELECT referred_by, referral_bonus_paid FROM users WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row)
    }

    pub async fn mark_referral_paid(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE users SET referral_bonus_paid = TRUE, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
