//! Funding webhook settlement.
//!
//! Signature verification, event-log idempotency, then the credit itself:
//! the processor-side amount is re-verified against the API before any
//! balance moves, and the credit + ledger update + referral bonus commit in
//! one DB transaction.

use bigdecimal::BigDecimal;
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::account_repository::AccountRepository;
use crate::database::app_settings_repository::AppSettingsRepository;
use crate::database::transaction_repository::{
    NewTransaction, TransactionRepository, TransactionStatus, TransactionType,
};
use crate::database::user_repository::UserRepository;
use crate::database::webhook_repository::{WebhookEventRow, WebhookRepository};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{PaymentState, StatusRequest, WebhookEvent};
use crate::services::referral::ReferralProcessor;

#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Already processed")]
    AlreadyProcessed,
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl From<crate::database::error::DatabaseError> for WebhookProcessorError {
    fn from(err: crate::database::error::DatabaseError) -> Self {
        WebhookProcessorError::DatabaseError(err.to_string())
    }
}

pub struct WebhookProcessor {
    pool: PgPool,
    webhook_repo: WebhookRepository,
    account_repo: AccountRepository,
    settings_repo: AppSettingsRepository,
    payment_provider: Arc<dyn PaymentProvider>,
    referral: ReferralProcessor,
}

impl WebhookProcessor {
    pub fn new(pool: PgPool, payment_provider: Arc<dyn PaymentProvider>) -> Self {
        let webhook_repo = WebhookRepository::new(pool.clone());
        let account_repo = AccountRepository::new(pool.clone());
        let settings_repo = AppSettingsRepository::new(pool.clone());
        Self {
            pool,
            webhook_repo,
            account_repo,
            settings_repo,
            payment_provider,
            referral: ReferralProcessor::new(),
        }
    }

    /// Entry point for the webhook route. Raw body bytes are required so the
    /// HMAC covers exactly what the provider signed.
    pub async fn process_webhook(
        &self,
        provider_name: &str,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<(), WebhookProcessorError> {
        if provider_name != self.payment_provider.name().as_str() {
            return Err(WebhookProcessorError::UnknownProvider(
                provider_name.to_string(),
            ));
        }

        let signature = signature.ok_or(WebhookProcessorError::InvalidSignature)?;
        let verification = self
            .payment_provider
            .verify_webhook(body, signature)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;
        if !verification.valid {
            warn!(provider = provider_name, "webhook signature rejected");
            return Err(WebhookProcessorError::InvalidSignature);
        }

        let event = self
            .payment_provider
            .parse_webhook_event(body)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;

        let event_id = extract_event_id(&event.payload)
            .or_else(|| event.transaction_reference.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let row = self
            .webhook_repo
            .log_event(provider_name, &event_id, &event.event_type, &event.payload)
            .await?;
        if row.is_completed() {
            return Err(WebhookProcessorError::AlreadyProcessed);
        }

        match self.process_event(&event).await {
            Ok(()) => {
                self.webhook_repo.mark_processed(row.id).await?;
                Ok(())
            }
            Err(e) => {
                self.webhook_repo
                    .record_failure(row.id, &e.to_string())
                    .await?;
                Err(e)
            }
        }
    }

    async fn process_event(&self, event: &WebhookEvent) -> Result<(), WebhookProcessorError> {
        match event.event_type.as_str() {
            "charge.success" => self.settle_funding(event).await,
            other => {
                // Non-settlement events are acknowledged and dropped.
                info!(event_type = other, "ignoring webhook event type");
                Ok(())
            }
        }
    }

    /// Apply a funding credit. Idempotent: a transaction already marked
    /// successful is a silent no-op.
    async fn settle_funding(&self, event: &WebhookEvent) -> Result<(), WebhookProcessorError> {
        let tx_ref = event.transaction_reference.as_deref().ok_or_else(|| {
            WebhookProcessorError::ProcessingError("missing reference in payload".to_string())
        })?;

        // Never trust the webhook body alone: confirm with the verify API.
        let verified = self
            .payment_provider
            .verify_transaction(StatusRequest {
                transaction_reference: tx_ref.to_string(),
            })
            .await
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;
        if verified.status != PaymentState::Success {
            return Err(WebhookProcessorError::ProcessingError(format!(
                "verification returned non-success state for {}",
                tx_ref
            )));
        }
        let verified_amount = verified
            .amount
            .as_ref()
            .ok_or_else(|| {
                WebhookProcessorError::ProcessingError("verification missing amount".to_string())
            })?
            .as_decimal()
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;
        if verified_amount <= BigDecimal::from(0) {
            return Err(WebhookProcessorError::ProcessingError(
                "verified amount is not positive".to_string(),
            ));
        }

        let settings = self.settings_repo.load().await?;

        let mut dbtx = self
            .pool
            .begin()
            .await
            .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;

        let existing = TransactionRepository::find_by_tx_ref_for_update(&mut *dbtx, tx_ref).await?;

        let (user_id, amount) = match &existing {
            Some(tx) => {
                let status = tx
                    .status()
                    .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;
                if status == TransactionStatus::Success {
                    // Duplicate delivery that slipped past the event log.
                    info!(tx_ref = %tx_ref, "funding already settled, skipping");
                    return Ok(());
                }
                if tx.tx_type != TransactionType::Funding.as_str() {
                    return Err(WebhookProcessorError::ProcessingError(format!(
                        "reference {} is not a funding transaction",
                        tx_ref
                    )));
                }
                if tx.amount != verified_amount {
                    return Err(WebhookProcessorError::ProcessingError(format!(
                        "amount mismatch for {}: ledger {} vs verified {}",
                        tx_ref, tx.amount, verified_amount
                    )));
                }
                (tx.user_id, tx.amount.clone())
            }
            None => {
                // Dedicated-account transfers arrive with the processor's own
                // reference; resolve the owner via the customer code.
                let user_id = self.resolve_user(&event.payload).await?;
                (user_id, verified_amount.clone())
            }
        };

        let balance_before = UserRepository::lock_balance(&mut *dbtx, user_id)
            .await?
            .ok_or_else(|| {
                WebhookProcessorError::ProcessingError(format!("user {} not found", user_id))
            })?;
        let balance_after = UserRepository::credit_balance(&mut *dbtx, user_id, &amount).await?;

        let settle_metadata = json!({
            "webhook_event": event.event_type,
            "provider_reference": event.provider_reference,
            "verified_at": chrono::Utc::now().to_rfc3339(),
        });

        if existing.is_none() {
            let new = NewTransaction {
                user_id,
                tx_ref: tx_ref.to_string(),
                tx_type: TransactionType::Funding,
                amount: amount.clone(),
                balance_before: balance_before.clone(),
                balance_after: balance_after.clone(),
                provider: Some(event.provider.as_str().to_string()),
                metadata: JsonValue::Object(Default::default()),
            };
            TransactionRepository::create(&mut *dbtx, &new).await?;
        }
        TransactionRepository::settle_funding(
            &mut *dbtx,
            tx_ref,
            &balance_before,
            &balance_after,
            &settle_metadata,
        )
        .await?;

        let reward = self
            .referral
            .process_deposit(&mut *dbtx, user_id, &amount, &settings.referral_percent)
            .await?;

        dbtx.commit()
            .await
            .map_err(|e| WebhookProcessorError::DatabaseError(e.to_string()))?;

        info!(
            tx_ref = %tx_ref,
            user_id = %user_id,
            amount = %amount,
            balance = %balance_after,
            referral_paid = reward.is_some(),
            "funding settled"
        );
        Ok(())
    }

    async fn resolve_user(&self, payload: &JsonValue) -> Result<Uuid, WebhookProcessorError> {
        let customer_code = payload
            .get("data")
            .and_then(|d| d.get("customer"))
            .and_then(|c| c.get("customer_code"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                WebhookProcessorError::ProcessingError(
                    "missing customer code in payload".to_string(),
                )
            })?;

        let account = self
            .account_repo
            .find_by_provider_reference(customer_code)
            .await?
            .ok_or_else(|| {
                WebhookProcessorError::ProcessingError(format!(
                    "no virtual account for customer {}",
                    customer_code
                ))
            })?;

        Ok(account.user_id)
    }

    /// Re-drive events whose processing failed. Called by the retry worker.
    pub async fn retry_pending(&self) -> Result<usize, WebhookProcessorError> {
        let events = self.webhook_repo.get_pending_events(50).await?;
        let mut retried = 0;

        for row in events {
            match self.retry_event(&row).await {
                Ok(()) => {
                    self.webhook_repo.mark_processed(row.id).await?;
                    retried += 1;
                }
                Err(e) => {
                    error!(event_id = %row.event_id, error = %e, "webhook retry failed");
                    self.webhook_repo
                        .record_failure(row.id, &e.to_string())
                        .await?;
                }
            }
        }

        Ok(retried)
    }

    async fn retry_event(&self, row: &WebhookEventRow) -> Result<(), WebhookProcessorError> {
        // Signature was verified at ingestion; replay from the stored payload.
        let body = serde_json::to_vec(&row.payload)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;
        let event = self
            .payment_provider
            .parse_webhook_event(&body)
            .map_err(|e| WebhookProcessorError::ProcessingError(e.to_string()))?;
        self.process_event(&event).await
    }
}

/// Provider event id from the payload, falling back to the nested data id.
pub fn extract_event_id(payload: &JsonValue) -> Option<String> {
    payload
        .get("id")
        .and_then(|v| v.as_i64())
        .map(|id| id.to_string())
        .or_else(|| {
            payload
                .get("data")
                .and_then(|d| d.get("id"))
                .and_then(|v| v.as_i64())
                .map(|id| id.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_prefers_top_level_id() {
        let payload = json!({ "id": 42, "data": { "id": 7 } });
        assert_eq!(extract_event_id(&payload), Some("42".to_string()));
    }

    #[test]
    fn event_id_falls_back_to_data_id() {
        let payload = json!({ "event": "charge.success", "data": { "id": 7 } });
        assert_eq!(extract_event_id(&payload), Some("7".to_string()));
    }

    #[test]
    fn event_id_missing_yields_none() {
        let payload = json!({ "event": "charge.success", "data": {} });
        assert_eq!(extract_event_id(&payload), None);
    }

    #[test]
    fn error_display_matches_route_expectations() {
        assert_eq!(
            WebhookProcessorError::InvalidSignature.to_string(),
            "Invalid signature"
        );
        assert_eq!(
            WebhookProcessorError::AlreadyProcessed.to_string(),
            "Already processed"
        );
        assert_eq!(
            WebhookProcessorError::UnknownProvider("test".to_string()).to_string(),
            "Unknown provider: test"
        );
    }
}
