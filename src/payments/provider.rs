use crate::payments::error::PaymentResult;
use crate::payments::types::{
    ProviderName, StatusRequest, StatusResponse, VirtualAccountDetails, VirtualAccountRequest,
    WebhookEvent, WebhookVerificationResult,
};
use async_trait::async_trait;

/// Funding processor gateway. Implementations own the wire format; callers
/// only see the normalized types.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Provision a dedicated virtual account a user can transfer into.
    async fn create_virtual_account(
        &self,
        request: VirtualAccountRequest,
    ) -> PaymentResult<VirtualAccountDetails>;

    /// Ask the processor for the authoritative state of a transaction.
    async fn verify_transaction(&self, request: StatusRequest) -> PaymentResult<StatusResponse>;

    fn name(&self) -> ProviderName;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult>;

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{Money, PaymentState};

    struct MockProvider;

    #[async_trait]
    impl PaymentProvider for MockProvider {
        async fn create_virtual_account(
            &self,
            request: VirtualAccountRequest,
        ) -> PaymentResult<VirtualAccountDetails> {
            Ok(VirtualAccountDetails {
                account_number: "9876543210".to_string(),
                account_name: format!("{} {}", request.first_name, request.last_name),
                bank_name: "Mock Bank".to_string(),
                provider_reference: Some("mock_ref".to_string()),
                provider_data: None,
            })
        }

        async fn verify_transaction(
            &self,
            request: StatusRequest,
        ) -> PaymentResult<StatusResponse> {
            Ok(StatusResponse {
                status: PaymentState::Success,
                transaction_reference: Some(request.transaction_reference),
                provider_reference: Some("mock_ref".to_string()),
                amount: Some(Money::ngn("1000.00")),
                paid_at: None,
                failure_reason: None,
                provider_data: None,
            })
        }

        fn name(&self) -> ProviderName {
            ProviderName::Paystack
        }

        fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> PaymentResult<WebhookVerificationResult> {
            Ok(WebhookVerificationResult {
                valid: true,
                reason: None,
            })
        }

        fn parse_webhook_event(&self, _payload: &[u8]) -> PaymentResult<WebhookEvent> {
            Ok(WebhookEvent {
                provider: ProviderName::Paystack,
                event_type: "mock".to_string(),
                transaction_reference: None,
                provider_reference: None,
                status: Some(PaymentState::Success),
                amount: None,
                payload: serde_json::json!({}),
                received_at: chrono::Utc::now().to_rfc3339(),
            })
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn PaymentProvider> = Box::new(MockProvider);

        let account = provider
            .create_virtual_account(VirtualAccountRequest {
                email: "test@example.com".to_string(),
                first_name: "Ade".to_string(),
                last_name: "Okafor".to_string(),
                phone: None,
            })
            .await
            .expect("account provisioning should succeed");
        assert_eq!(account.account_number, "9876543210");

        let status = provider
            .verify_transaction(StatusRequest {
                transaction_reference: "vtu-1".to_string(),
            })
            .await
            .expect("verification should succeed");
        assert_eq!(status.status, PaymentState::Success);
    }
}
