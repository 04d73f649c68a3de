//! Referral bonus processor.
//!
//! Runs inside the funding settlement DB transaction: the referrer credit and
//! the `referral_bonus_paid` claim commit together or not at all, so the
//! bonus can pay out at most once.

use bigdecimal::BigDecimal;
use sqlx::PgConnection;
use tracing::info;
use uuid::Uuid;

use crate::database::error::DatabaseResult;
use crate::database::transaction_repository::TransactionRepository;
use crate::database::user_repository::UserRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct ReferralReward {
    pub referrer_id: Uuid,
    pub bonus: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct ReferralProcessor;

impl ReferralProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Called after a funding credit has been applied on `conn`, still inside
    /// the caller's transaction. Pays the referrer `percent` of the deposit
    /// when this is the user's first successful funding and the bonus is
    /// still unclaimed.
    pub async fn process_deposit(
        &self,
        conn: &mut PgConnection,
        user_id: Uuid,
        deposit: &BigDecimal,
        percent: &BigDecimal,
    ) -> DatabaseResult<Option<ReferralReward>> {
        let Some((referred_by, bonus_paid)) =
            UserRepository::lock_referral_state(conn, user_id).await?
        else {
            return Ok(None);
        };
        let Some(referrer_id) = referred_by else {
            return Ok(None);
        };
        if bonus_paid {
            return Ok(None);
        }

        // The deposit being settled is already counted, so first-deposit
        // means exactly one successful funding row.
        let funding_count = TransactionRepository::count_successful_funding(conn, user_id).await?;
        if funding_count != 1 {
            return Ok(None);
        }

        let bonus = (deposit * percent) / BigDecimal::from(100);
        if bonus <= BigDecimal::from(0) {
            return Ok(None);
        }

        UserRepository::credit_balance(conn, referrer_id, &bonus).await?;
        UserRepository::mark_referral_paid(conn, user_id).await?;

        info!(
            user_id = %user_id,
            referrer_id = %referrer_id,
            bonus = %bonus,
            "referral bonus credited"
        );

        Ok(Some(ReferralReward { referrer_id, bonus }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn bonus_computation_uses_percentage() {
        let deposit = BigDecimal::from(10000);
        let percent = BigDecimal::from_str("2.5").unwrap();
        let bonus = (&deposit * &percent) / BigDecimal::from(100);
        assert_eq!(bonus, BigDecimal::from(250));
    }
}
