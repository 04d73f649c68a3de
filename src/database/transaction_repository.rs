//! Ledger of wallet movements: funding deposits and vending purchases.
//!
//! Every row carries the balance snapshot taken at write time and a metadata
//! blob holding the raw provider payloads, so a transaction is auditable on
//! its own.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgConnection, PgPool};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::{DatabaseError, DatabaseResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(DatabaseError::Serialization {
                message: format!("unknown transaction status: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Funding,
    Airtime,
    Data,
    Electricity,
    CableTv,
    Exam,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Funding => "funding",
            TransactionType::Airtime => "airtime",
            TransactionType::Data => "data",
            TransactionType::Electricity => "electricity",
            TransactionType::CableTv => "cable_tv",
            TransactionType::Exam => "exam",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "funding" => Ok(TransactionType::Funding),
            "airtime" => Ok(TransactionType::Airtime),
            "data" => Ok(TransactionType::Data),
            "electricity" => Ok(TransactionType::Electricity),
            "cable_tv" => Ok(TransactionType::CableTv),
            "exam" => Ok(TransactionType::Exam),
            other => Err(DatabaseError::Serialization {
                message: format!("unknown transaction type: {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub tx_ref: String,
    pub tx_type: String,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub status: String,
    pub provider: Option<String>,
    pub provider_reference: Option<String>,
    pub error_message: Option<String>,
    pub requery_attempts: i32,
    pub metadata: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn status(&self) -> DatabaseResult<TransactionStatus> {
        self.status.parse()
    }

    pub fn tx_type(&self) -> DatabaseResult<TransactionType> {
        self.tx_type.parse()
    }

    pub fn is_refunded(&self) -> bool {
        self.metadata
            .get("refunded")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn needs_manual_review(&self) -> bool {
        self.metadata
            .get("manual_review")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub tx_ref: String,
    pub tx_type: TransactionType,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub provider: Option<String>,
    pub metadata: JsonValue,
}

const SELECT_COLUMNS: &str = r#"
    transaction_id, user_id, tx_ref, tx_type, amount, balance_before,
    balance_after, status, provider, provider_reference, error_message,
    requery_attempts, metadata, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: PgPool,
}

impl TransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending transaction. A duplicate `tx_ref` surfaces as
    /// `DatabaseError::UniqueViolation`.
    pub async fn create(
        conn: &mut PgConnection,
        new: &NewTransaction,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            INSERT INTO transactions
                (transaction_id, user_id, tx_ref, tx_type, amount, balance_before,
                 balance_after, status, provider, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9)
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(&new.tx_ref)
            .bind(new.tx_type.as_str())
            .bind(&new.amount)
            .bind(&new.balance_before)
            .bind(&new.balance_after)
            .bind(&new.provider)
            .bind(&new.metadata)
            .fetch_one(conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(tx)
    }

    pub async fn find_by_tx_ref(&self, tx_ref: &str) -> DatabaseResult<Option<Transaction>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE tx_ref = $1");

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(tx)
    }

    /// Fetch and lock a transaction row inside an open DB transaction.
    pub async fn find_by_tx_ref_for_update(
        conn: &mut PgConnection,
        tx_ref: &str,
    ) -> DatabaseResult<Option<Transaction>> {
        let query =
            format!("SELECT {SELECT_COLUMNS} FROM transactions WHERE tx_ref = $1 FOR UPDATE");

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(tx)
    }

    pub async fn find_recent_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> DatabaseResult<Vec<Transaction>> {
        let query = format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, Transaction>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(rows)
    }

    /// Mark success and merge the provider payload into the metadata blob.
    pub async fn mark_success(
        &self,
        tx_ref: &str,
        provider_reference: Option<&str>,
        metadata: &JsonValue,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET status = 'success',
                provider_reference = COALESCE($2, provider_reference),
                metadata = metadata || $3,
                updated_at = NOW()
            WHERE tx_ref = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(provider_reference)
            .bind(metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.ok_or_else(|| DatabaseError::not_found("transaction"))
    }

    pub async fn mark_failed(
        &self,
        tx_ref: &str,
        error_message: &str,
        metadata: &JsonValue,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET status = 'failed',
                error_message = $2,
                metadata = metadata || $3,
                updated_at = NOW()
            WHERE tx_ref = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(error_message)
            .bind(metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.ok_or_else(|| DatabaseError::not_found("transaction"))
    }

    /// Merge metadata without touching the status. Used to attach reseller
    /// references to still-pending vends.
    pub async fn merge_metadata(
        &self,
        tx_ref: &str,
        provider_reference: Option<&str>,
        metadata: &JsonValue,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET provider_reference = COALESCE($2, provider_reference),
                metadata = metadata || $3,
                updated_at = NOW()
            WHERE tx_ref = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(provider_reference)
            .bind(metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.ok_or_else(|| DatabaseError::not_found("transaction"))
    }

    /// In-transaction settlement update for funding credits: flips the row to
    /// success and records the balance movement observed under the row lock.
    pub async fn settle_funding(
        conn: &mut PgConnection,
        tx_ref: &str,
        balance_before: &BigDecimal,
        balance_after: &BigDecimal,
        metadata: &JsonValue,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET status = 'success',
                balance_before = $2,
                balance_after = $3,
                metadata = metadata || $4,
                updated_at = NOW()
            WHERE tx_ref = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(balance_before)
            .bind(balance_after)
            .bind(metadata)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.ok_or_else(|| DatabaseError::not_found("transaction"))
    }

    /// In-transaction refund marker, paired with the balance credit.
    pub async fn mark_refunded(
        conn: &mut PgConnection,
        tx_ref: &str,
        metadata: &JsonValue,
    ) -> DatabaseResult<Transaction> {
        let query = format!(
            r#"
            UPDATE transactions
            SET metadata = metadata || $2,
                updated_at = NOW()
            WHERE tx_ref = $1
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(metadata)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.ok_or_else(|| DatabaseError::not_found("transaction"))
    }

    /// Pending vends older than the grace period, oldest first. Funding rows
    /// are excluded; those settle via webhooks.
    pub async fn find_pending_for_requery(
        &self,
        grace: chrono::Duration,
        limit: i64,
    ) -> DatabaseResult<Vec<Transaction>> {
        let cutoff = Utc::now() - grace;
        let query = format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM transactions
            WHERE status = 'pending'
              AND tx_type != 'funding'
              AND created_at < $1
            ORDER BY created_at ASC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, Transaction>(&query)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(rows)
    }

    /// Count one requery attempt against a still-pending vend. Reaching
    /// `max_attempts` flips the row to failed and flags it for manual review,
    /// which puts it in reach of the refund path. `None` means the row is no
    /// longer pending; a concurrent requery already resolved it.
    pub async fn record_requery_attempt(
        &self,
        tx_ref: &str,
        max_attempts: i32,
    ) -> DatabaseResult<Option<Transaction>> {
        let query = format!(
            r#"
            UPDATE transactions
            SET requery_attempts = requery_attempts + 1,
                status = CASE
                    WHEN requery_attempts + 1 >= $2 THEN 'failed'
                    ELSE status
                END,
                error_message = CASE
                    WHEN requery_attempts + 1 >= $2
                        THEN 'requery attempts exhausted, awaiting manual review'
                    ELSE error_message
                END,
                metadata = CASE
                    WHEN requery_attempts + 1 >= $2
                        THEN metadata || '{{"manual_review": true}}'::jsonb
                    ELSE metadata
                END,
                updated_at = NOW()
            WHERE tx_ref = $1 AND status = 'pending'
            RETURNING {SELECT_COLUMNS}
            "#
        );

        let tx = sqlx::query_as::<_, Transaction>(&query)
            .bind(tx_ref)
            .bind(max_attempts)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(tx)
    }

    /// Successful funding deposits for a user, counted inside the settlement
    /// transaction so the first-deposit referral gate sees its own credit.
    pub async fn count_successful_funding(
        conn: &mut PgConnection,
        user_id: Uuid,
    ) -> DatabaseResult<i64> {
        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            SELECT COUNT(*) FROM transactions
            WHERE user_id = $1 AND tx_type = 'funding' AND status = 'success'
            "#,
        )
        .bind(user_id)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
        ] {
            assert_eq!(
                status.as_str().parse::<TransactionStatus>().ok(),
                Some(status)
            );
        }
        assert!("reversed".parse::<TransactionStatus>().is_err());
    }

    #[test]
    fn tx_type_round_trips() {
        for ty in [
            TransactionType::Funding,
            TransactionType::Airtime,
            TransactionType::Data,
            TransactionType::Electricity,
            TransactionType::CableTv,
            TransactionType::Exam,
        ] {
            assert_eq!(ty.as_str().parse::<TransactionType>().ok(), Some(ty));
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
    }
}
