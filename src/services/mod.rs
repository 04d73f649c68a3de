//! Business logic: purchase settlement, funding webhooks, referrals and
//! virtual account provisioning.

pub mod accounts;
pub mod referral;
pub mod settlement;
pub mod webhook_processor;

pub use accounts::VirtualAccountService;
pub use referral::{ReferralProcessor, ReferralReward};
pub use settlement::{PurchaseOrder, PurchaseOutcome, SettlementEngine};
pub use webhook_processor::{WebhookProcessor, WebhookProcessorError};
