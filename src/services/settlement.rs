//! Purchase settlement engine.
//!
//! The one ordering rule everything else hangs off: the wallet debit and the
//! pending transaction row COMMIT before the reseller is called. A crash
//! between commit and vend leaves a debited pending row the requery worker
//! can resolve; there is no window where money moved without a ledger entry.

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::app_settings_repository::AppSettingsRepository;
use crate::database::transaction_repository::{
    NewTransaction, Transaction, TransactionRepository, TransactionStatus,
};
use crate::database::user_repository::UserRepository;
use crate::error::{
    AppError, AppErrorKind, DomainError, InfrastructureError, ValidationError,
};
use crate::vending::factory::VendingProviderFactory;
use crate::vending::types::{ServiceKind, VendRequest, VendResponse, VendStatus};

/// A validated purchase instruction, one vend attempt.
#[derive(Debug, Clone)]
pub struct PurchaseOrder {
    pub user_id: Uuid,
    pub service: ServiceKind,
    pub amount: BigDecimal,
    pub phone: Option<String>,
    pub network: Option<crate::vending::types::Network>,
    pub plan_code: Option<String>,
    pub meter_number: Option<String>,
    pub meter_type: Option<crate::vending::types::MeterType>,
    pub smartcard_number: Option<String>,
    pub bouquet_code: Option<String>,
    pub exam_kind: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOutcome {
    pub tx_ref: String,
    pub status: TransactionStatus,
    pub balance: BigDecimal,
    pub token: Option<String>,
    pub message: Option<String>,
}

pub struct SettlementEngine {
    pool: PgPool,
    vending: Arc<VendingProviderFactory>,
    settings_repo: AppSettingsRepository,
    transaction_repo: TransactionRepository,
}

impl SettlementEngine {
    pub fn new(pool: PgPool, vending: Arc<VendingProviderFactory>) -> Self {
        let settings_repo = AppSettingsRepository::new(pool.clone());
        let transaction_repo = TransactionRepository::new(pool.clone());
        Self {
            pool,
            vending,
            settings_repo,
            transaction_repo,
        }
    }

    pub fn generate_tx_ref() -> String {
        format!("vtu-{}", Uuid::new_v4().simple())
    }

    /// Full purchase flow: settings gate, atomic debit + pending row, commit,
    /// vend, record outcome.
    pub async fn purchase(&self, order: PurchaseOrder) -> Result<PurchaseOutcome, AppError> {
        self.validate_order(&order).await?;

        let tx_ref = Self::generate_tx_ref();

        // The reseller client is built before any money moves. A credential
        // misconfiguration must surface here, not on a debited pending row
        // the requery worker can never resolve.
        let provider = self.vending.get_provider(order.service)?;
        let reseller = provider.name();

        // Step 1: debit and pending row in one DB transaction, committed
        // before any network traffic.
        let (_transaction, new_balance) = self
            .debit_and_record(&order, &tx_ref, reseller.as_str())
            .await?;

        info!(
            tx_ref = %tx_ref,
            user_id = %order.user_id,
            service = %order.service,
            amount = %order.amount,
            "purchase debited, dispatching vend"
        );

        // Step 2: the vend call, outside any DB transaction.
        let vend_request = self.build_vend_request(&order, &tx_ref);
        let vend_result = provider.vend(vend_request).await;

        // Step 3: record the outcome. The transaction row must never be left
        // without the provider response.
        self.apply_vend_outcome(&tx_ref, vend_result, new_balance).await
    }

    async fn validate_order(&self, order: &PurchaseOrder) -> Result<(), AppError> {
        if order.amount <= BigDecimal::from(0) {
            return Err(AppError::validation(ValidationError::InvalidAmount {
                amount: order.amount.to_string(),
                reason: "amount must be greater than zero".to_string(),
            }));
        }

        let settings = self.settings_repo.load().await?;
        if settings.maintenance_mode {
            return Err(AppError::domain(DomainError::MaintenanceMode));
        }
        if settings.is_service_disabled(order.service.as_str()) {
            return Err(AppError::domain(DomainError::ServiceDisabled {
                service: order.service.to_string(),
            }));
        }
        if order.amount < settings.min_purchase || order.amount > settings.max_purchase {
            return Err(AppError::domain(DomainError::AmountOutOfRange {
                amount: order.amount.to_string(),
                min: settings.min_purchase.to_string(),
                max: settings.max_purchase.to_string(),
            }));
        }

        Ok(())
    }

    async fn debit_and_record(
        &self,
        order: &PurchaseOrder,
        tx_ref: &str,
        reseller: &str,
    ) -> Result<(Transaction, BigDecimal), AppError> {
        let mut dbtx = self.pool.begin().await.map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: e.to_string(),
                is_retryable: true,
            }))
        })?;

        let balance_before = UserRepository::lock_balance(&mut *dbtx, order.user_id)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::UserNotFound {
                    user_id: order.user_id.to_string(),
                })
            })?;

        if balance_before < order.amount {
            return Err(AppError::domain(DomainError::InsufficientBalance {
                available: balance_before.to_string(),
                required: order.amount.to_string(),
            }));
        }

        let balance_after = UserRepository::debit_balance(&mut *dbtx, order.user_id, &order.amount)
            .await?
            .ok_or_else(|| {
                // Row was locked above, so the guard can only fail on a
                // concurrent schema-level surprise. Treat as insufficient.
                AppError::domain(DomainError::InsufficientBalance {
                    available: balance_before.to_string(),
                    required: order.amount.to_string(),
                })
            })?;

        let new = NewTransaction {
            user_id: order.user_id,
            tx_ref: tx_ref.to_string(),
            tx_type: order.service.transaction_type(),
            amount: order.amount.clone(),
            balance_before,
            balance_after: balance_after.clone(),
            provider: Some(reseller.to_string()),
            metadata: json!({
                "phone": order.phone,
                "network": order.network,
                "plan_code": order.plan_code,
                "meter_number": order.meter_number,
                "smartcard_number": order.smartcard_number,
                "exam_kind": order.exam_kind,
            }),
        };
        let transaction = TransactionRepository::create(&mut *dbtx, &new)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    AppError::domain(DomainError::DuplicateTransaction {
                        tx_ref: tx_ref.to_string(),
                    })
                } else {
                    e.into()
                }
            })?;

        dbtx.commit().await.map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: e.to_string(),
                is_retryable: true,
            }))
        })?;

        Ok((transaction, balance_after))
    }

    fn build_vend_request(&self, order: &PurchaseOrder, tx_ref: &str) -> VendRequest {
        VendRequest {
            tx_ref: tx_ref.to_string(),
            service: order.service,
            amount: order.amount.clone(),
            phone: order.phone.clone(),
            network: order.network,
            plan_code: order.plan_code.clone(),
            meter_number: order.meter_number.clone(),
            meter_type: order.meter_type,
            smartcard_number: order.smartcard_number.clone(),
            bouquet_code: order.bouquet_code.clone(),
            exam_kind: order.exam_kind.clone(),
            quantity: order.quantity,
        }
    }

    async fn apply_vend_outcome(
        &self,
        tx_ref: &str,
        vend_result: Result<VendResponse, crate::vending::error::VendError>,
        balance: BigDecimal,
    ) -> Result<PurchaseOutcome, AppError> {
        match vend_result {
            Ok(response) => {
                let outcome = self.apply_vend_response(tx_ref, &response).await?;
                Ok(PurchaseOutcome {
                    tx_ref: tx_ref.to_string(),
                    status: outcome,
                    balance,
                    token: response.token,
                    message: response.message,
                })
            }
            Err(err) if err.is_retryable() => {
                // Outcome unknown (timeout, 5xx): keep the row pending and
                // let the requery worker resolve it.
                warn!(tx_ref = %tx_ref, error = %err, "vend outcome unknown, leaving pending for requery");
                self.transaction_repo
                    .merge_metadata(
                        tx_ref,
                        None,
                        &json!({ "vend_error": err.to_string(), "requery_needed": true }),
                    )
                    .await?;
                Ok(PurchaseOutcome {
                    tx_ref: tx_ref.to_string(),
                    status: TransactionStatus::Pending,
                    balance,
                    token: None,
                    message: Some("purchase is being processed".to_string()),
                })
            }
            Err(err) => {
                error!(tx_ref = %tx_ref, error = %err, "vend failed");
                if let Err(db_err) = self
                    .transaction_repo
                    .mark_failed(tx_ref, &err.to_string(), &json!({ "vend_error": err.to_string() }))
                    .await
                {
                    // The debit is committed; losing the failure marker would
                    // orphan it. Surface loudly.
                    error!(
                        tx_ref = %tx_ref,
                        error = %db_err,
                        "CRITICAL: failed to record vend failure for debited transaction"
                    );
                    return Err(db_err.into());
                }
                Ok(PurchaseOutcome {
                    tx_ref: tx_ref.to_string(),
                    status: TransactionStatus::Failed,
                    balance,
                    token: None,
                    message: Some(err.to_string()),
                })
            }
        }
    }

    async fn apply_vend_response(
        &self,
        tx_ref: &str,
        response: &VendResponse,
    ) -> Result<TransactionStatus, AppError> {
        let metadata = json!({
            "provider_response": response.provider_data,
            "token": response.token,
        });
        match response.status {
            VendStatus::Delivered => {
                self.transaction_repo
                    .mark_success(tx_ref, response.provider_reference.as_deref(), &metadata)
                    .await?;
                info!(tx_ref = %tx_ref, "vend delivered");
                Ok(TransactionStatus::Success)
            }
            VendStatus::Processing => {
                self.transaction_repo
                    .merge_metadata(tx_ref, response.provider_reference.as_deref(), &metadata)
                    .await?;
                info!(tx_ref = %tx_ref, "vend processing, pending requery");
                Ok(TransactionStatus::Pending)
            }
            VendStatus::Failed => {
                let message = response
                    .message
                    .clone()
                    .unwrap_or_else(|| "vend failed".to_string());
                self.transaction_repo
                    .mark_failed(tx_ref, &message, &metadata)
                    .await?;
                warn!(tx_ref = %tx_ref, message = %message, "vend failed");
                Ok(TransactionStatus::Failed)
            }
        }
    }

    /// Re-ask the reseller about a pending vend and apply the same terminal
    /// transitions as the purchase path.
    pub async fn requery(&self, tx_ref: &str) -> Result<TransactionStatus, AppError> {
        let transaction = self
            .transaction_repo
            .find_by_tx_ref(tx_ref)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    tx_ref: tx_ref.to_string(),
                })
            })?;

        let status = transaction.status()?;
        if status.is_terminal() {
            return Ok(status);
        }
        let service = ServiceKind::from_transaction_type(transaction.tx_type()?).ok_or_else(
            || {
                AppError::domain(DomainError::TransactionNotRefundable {
                    tx_ref: tx_ref.to_string(),
                    reason: "funding transactions settle via webhooks".to_string(),
                })
            },
        )?;

        let provider = self.vending.get_provider(service)?;
        let response = provider.requery(tx_ref).await?;
        self.apply_vend_response(tx_ref, &response).await
    }

    /// Idempotent compensating credit for a failed vend. Credits the wallet
    /// and flags the row refunded in one DB transaction; a repeat call
    /// returns the already-refunded row unchanged.
    pub async fn refund(&self, tx_ref: &str) -> Result<Transaction, AppError> {
        let mut dbtx = self.pool.begin().await.map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: e.to_string(),
                is_retryable: true,
            }))
        })?;

        let transaction = TransactionRepository::find_by_tx_ref_for_update(&mut *dbtx, tx_ref)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::TransactionNotFound {
                    tx_ref: tx_ref.to_string(),
                })
            })?;

        if transaction.is_refunded() {
            return Ok(transaction);
        }
        match transaction.status()? {
            TransactionStatus::Failed => {}
            other => {
                return Err(AppError::domain(DomainError::TransactionNotRefundable {
                    tx_ref: tx_ref.to_string(),
                    reason: format!("transaction is {}", other),
                }));
            }
        }

        let new_balance =
            UserRepository::credit_balance(&mut *dbtx, transaction.user_id, &transaction.amount)
                .await?;
        let refunded = TransactionRepository::mark_refunded(
            &mut *dbtx,
            tx_ref,
            &json!({
                "refunded": true,
                "refunded_at": chrono::Utc::now().to_rfc3339(),
            }),
        )
        .await?;

        dbtx.commit().await.map_err(|e| {
            AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                message: e.to_string(),
                is_retryable: true,
            }))
        })?;

        info!(
            tx_ref = %tx_ref,
            user_id = %refunded.user_id,
            amount = %refunded.amount,
            balance = %new_balance,
            "failed vend refunded"
        );
        Ok(refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_ref_generation_is_unique_and_prefixed() {
        let a = SettlementEngine::generate_tx_ref();
        let b = SettlementEngine::generate_tx_ref();
        assert!(a.starts_with("vtu-"));
        assert_ne!(a, b);
    }
}
