//! Global application settings singleton.
//!
//! A single row (id = TRUE with a CHECK constraint) holds the operational
//! toggles the settlement flow reads on every purchase: maintenance mode,
//! amount limits, disabled transaction types and the referral percentage.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::error::{DatabaseError, DatabaseResult};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AppSettings {
    pub maintenance_mode: bool,
    pub min_purchase: BigDecimal,
    pub max_purchase: BigDecimal,
    pub disabled_services: Vec<String>,
    pub referral_percent: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

impl AppSettings {
    pub fn is_service_disabled(&self, service: &str) -> bool {
        self.disabled_services.iter().any(|s| s == service)
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AppSettingsUpdate {
    pub maintenance_mode: Option<bool>,
    pub min_purchase: Option<BigDecimal>,
    pub max_purchase: Option<BigDecimal>,
    pub disabled_services: Option<Vec<String>>,
    pub referral_percent: Option<BigDecimal>,
}

#[derive(Debug, Clone)]
pub struct AppSettingsRepository {
    pool: PgPool,
}

impl AppSettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn load(&self) -> DatabaseResult<AppSettings> {
        let settings = sqlx::query_as::<_, AppSettings>(
            r#"
            SELECT maintenance_mode, min_purchase, max_purchase, disabled_services,
                   referral_percent, updated_at
            FROM app_settings
            WHERE id = TRUE
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        settings.ok_or_else(|| DatabaseError::not_found("app_settings"))
    }

    pub async fn update(&self, update: &AppSettingsUpdate) -> DatabaseResult<AppSettings> {
        let settings = sqlx::query_as::<_, AppSettings>(
            r#"
            UPDATE app_settings
            SET maintenance_mode = COALESCE($1, maintenance_mode),
                min_purchase = COALESCE($2, min_purchase),
                max_purchase = COALESCE($3, max_purchase),
                disabled_services = COALESCE($4, disabled_services),
                referral_percent = COALESCE($5, referral_percent),
                updated_at = NOW()
            WHERE id = TRUE
            RETURNING maintenance_mode, min_purchase, max_purchase, disabled_services,
                      referral_percent, updated_at
            "#,
        )
        .bind(update.maintenance_mode)
        .bind(&update.min_purchase)
        .bind(&update.max_purchase)
        .bind(&update.disabled_services)
        .bind(&update.referral_percent)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        settings.ok_or_else(|| DatabaseError::not_found("app_settings"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn settings() -> AppSettings {
        AppSettings {
            maintenance_mode: false,
            min_purchase: BigDecimal::from_str("50").unwrap(),
            max_purchase: BigDecimal::from_str("50000").unwrap(),
            disabled_services: vec!["exam".to_string()],
            referral_percent: BigDecimal::from_str("2.5").unwrap(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn disabled_service_lookup() {
        let s = settings();
        assert!(s.is_service_disabled("exam"));
        assert!(!s.is_service_disabled("airtime"));
    }
}
