//! Webhook event log.
//!
//! Events are keyed by (provider, event_id) so duplicate deliveries collapse
//! onto one row. The row doubles as the retry queue for events whose
//! processing failed.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::error::{DatabaseError, DatabaseResult};

pub const MAX_RETRY_COUNT: i32 = 5;

#[derive(Debug, Clone, FromRow)]
pub struct WebhookEventRow {
    pub id: Uuid,
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookEventRow {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

#[derive(Debug, Clone)]
pub struct WebhookRepository {
    pool: PgPool,
}

impl WebhookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record an incoming event. On duplicate delivery the existing row is
    /// returned unchanged, so callers can inspect its status.
    pub async fn log_event(
        &self,
        provider: &str,
        event_id: &str,
        event_type: &str,
        payload: &JsonValue,
    ) -> DatabaseResult<WebhookEventRow> {
        let row = sqlx::query_as::<_, WebhookEventRow>(
            r#"
            INSERT INTO webhook_events (id, provider, event_id, event_type, payload, status)
            VALUES ($1, $2, $3, $4, $5, 'received')
            ON CONFLICT (provider, event_id) DO UPDATE SET updated_at = webhook_events.updated_at
            RETURNING id, provider, event_id, event_type, payload, status,
                      retry_count, last_error, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(event_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row)
    }

    pub async fn mark_processed(&self, id: Uuid) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE webhook_events SET status = 'completed', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    pub async fn record_failure(&self, id: Uuid, error: &str) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET status = 'failed',
                retry_count = retry_count + 1,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    /// Events still awaiting a successful processing pass, oldest first.
    pub async fn get_pending_events(&self, limit: i64) -> DatabaseResult<Vec<WebhookEventRow>> {
        let rows = sqlx::query_as::<_, WebhookEventRow>(
            r#"
            SELECT id, provider, event_id, event_type, payload, status,
                   retry_count, last_error, created_at, updated_at
            FROM webhook_events
            WHERE status IN ('received', 'failed') AND retry_count < $2
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .bind(MAX_RETRY_COUNT)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(rows)
    }
}
