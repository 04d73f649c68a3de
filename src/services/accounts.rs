//! Lazy provisioning of dedicated virtual funding accounts.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::database::account_repository::{AccountRepository, NewVirtualAccount, VirtualAccount};
use crate::database::user_repository::UserRepository;
use crate::error::{AppError, DomainError};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::VirtualAccountRequest;

pub struct VirtualAccountService {
    account_repo: AccountRepository,
    user_repo: UserRepository,
    payment_provider: Arc<dyn PaymentProvider>,
}

impl VirtualAccountService {
    pub fn new(
        account_repo: AccountRepository,
        user_repo: UserRepository,
        payment_provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        Self {
            account_repo,
            user_repo,
            payment_provider,
        }
    }

    /// Idempotent: an existing account is returned as-is; otherwise one is
    /// provisioned at the processor and cached. A provisioning race loses to
    /// the unique constraint and falls back to the winner's row.
    pub async fn get_or_provision(&self, user_id: Uuid) -> Result<VirtualAccount, AppError> {
        if let Some(existing) = self.account_repo.find_by_user(user_id).await? {
            return Ok(existing);
        }

        let user = self.user_repo.find_by_id(user_id).await?.ok_or_else(|| {
            AppError::domain(DomainError::UserNotFound {
                user_id: user_id.to_string(),
            })
        })?;

        let details = self
            .payment_provider
            .create_virtual_account(VirtualAccountRequest {
                email: user.email.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                phone: user.phone.clone(),
            })
            .await?;

        let new = NewVirtualAccount {
            user_id,
            account_number: details.account_number,
            account_name: details.account_name,
            bank_name: details.bank_name,
            provider: self.payment_provider.name().as_str().to_string(),
            provider_reference: details.provider_reference,
        };

        match self.account_repo.insert(&new).await {
            Ok(account) => {
                info!(user_id = %user_id, account_number = %account.account_number, "virtual account provisioned");
                Ok(account)
            }
            Err(e) if e.is_unique_violation() => {
                let existing = self.account_repo.find_by_user(user_id).await?;
                existing.ok_or_else(|| e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
