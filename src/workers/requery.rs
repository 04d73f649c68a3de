//! Requery worker for stuck vends.
//!
//! Purchases whose vend outcome was unknown (timeout, reseller 5xx,
//! "processing") stay pending in the ledger. This worker periodically asks
//! the reseller again and applies the terminal transition once one exists.
//! Attempts are bounded: a vend still unresolved after `max_attempts` is
//! marked failed and flagged for manual review, so the refund path can
//! reach it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::SettlementConfig;
use crate::database::transaction_repository::{TransactionRepository, TransactionStatus};
use crate::services::settlement::SettlementEngine;

#[derive(Debug, Clone)]
pub struct RequeryWorkerConfig {
    /// How often the worker wakes up to scan for stuck vends.
    pub poll_interval: Duration,
    /// Pending rows younger than this are skipped; the reseller may still be
    /// working on them.
    pub grace: Duration,
    /// Maximum rows picked up per sweep.
    pub batch_size: i64,
    /// Requery attempts per transaction before it is flagged for manual
    /// review.
    pub max_attempts: u32,
}

impl Default for RequeryWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(120),
            grace: Duration::from_secs(90),
            batch_size: 25,
            max_attempts: 10,
        }
    }
}

impl RequeryWorkerConfig {
    pub fn from_settlement(config: &SettlementConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.requery_interval),
            grace: Duration::from_secs(config.requery_grace),
            batch_size: config.requery_batch_size,
            max_attempts: config.requery_max_attempts,
        }
    }
}

pub struct RequeryWorker {
    engine: Arc<SettlementEngine>,
    transaction_repo: TransactionRepository,
    config: RequeryWorkerConfig,
}

impl RequeryWorker {
    pub fn new(
        engine: Arc<SettlementEngine>,
        transaction_repo: TransactionRepository,
        config: RequeryWorkerConfig,
    ) -> Self {
        Self {
            engine,
            transaction_repo,
            config,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.config.poll_interval);
        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            grace_secs = self.config.grace.as_secs(),
            batch_size = self.config.batch_size,
            "Requery worker started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Requery worker shutting down");
                        return;
                    }
                    continue;
                }
            }

            if let Err(e) = self.sweep().await {
                error!(error = %e, "Requery sweep failed");
            }
        }
    }

    /// One scan: fetch pending non-funding rows past the grace window and
    /// requery each. Per-row failures are logged, never fatal to the sweep.
    async fn sweep(&self) -> Result<(), crate::database::error::DatabaseError> {
        let grace = chrono::Duration::seconds(self.config.grace.as_secs() as i64);
        let pending = self
            .transaction_repo
            .find_pending_for_requery(grace, self.config.batch_size)
            .await?;

        if pending.is_empty() {
            return Ok(());
        }
        info!(count = pending.len(), "Requerying stuck vends");

        for transaction in pending {
            let resolved = match self.engine.requery(&transaction.tx_ref).await {
                Ok(status) => {
                    info!(
                        tx_ref = %transaction.tx_ref,
                        status = %status,
                        "Requery resolved"
                    );
                    status.is_terminal()
                }
                Err(e) => {
                    warn!(
                        tx_ref = %transaction.tx_ref,
                        error = %e,
                        "Requery attempt failed"
                    );
                    false
                }
            };

            if resolved {
                continue;
            }
            match self
                .transaction_repo
                .record_requery_attempt(&transaction.tx_ref, self.config.max_attempts as i32)
                .await
            {
                Ok(Some(row)) => {
                    if matches!(row.status(), Ok(TransactionStatus::Failed)) {
                        warn!(
                            tx_ref = %row.tx_ref,
                            attempts = row.requery_attempts,
                            "Requery attempts exhausted, flagged for manual review"
                        );
                    }
                }
                // Another requery resolved the row between the sweep's fetch
                // and the attempt update.
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        tx_ref = %transaction.tx_ref,
                        error = %e,
                        "Failed to record requery attempt"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_settlement_maps_fields() {
        let settlement = SettlementConfig {
            requery_interval: 30,
            requery_grace: 45,
            requery_batch_size: 10,
            requery_max_attempts: 3,
            webhook_retry_interval: 60,
        };
        let config = RequeryWorkerConfig::from_settlement(&settlement);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.grace, Duration::from_secs(45));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_attempts, 3);
    }
}
