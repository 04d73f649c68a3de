use crate::vending::error::{VendError, VendResult};
use crate::vending::types::{ResellerName, ServiceKind, VendRequest, VendResponse};
use async_trait::async_trait;

/// Reseller gateway. `vend` is called exactly once per transaction after the
/// debit has committed; `requery` resolves vends that came back ambiguous.
#[async_trait]
pub trait VendingProvider: Send + Sync {
    async fn vend(&self, request: VendRequest) -> VendResult<VendResponse>;

    /// Re-ask the reseller for the state of an earlier vend, by our `tx_ref`.
    async fn requery(&self, tx_ref: &str) -> VendResult<VendResponse>;

    fn name(&self) -> ResellerName;

    fn supported_services(&self) -> &'static [ServiceKind];

    fn ensure_supported(&self, service: ServiceKind) -> VendResult<()> {
        if self.supported_services().contains(&service) {
            Ok(())
        } else {
            Err(VendError::UnsupportedService {
                service: service.to_string(),
                provider: self.name().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vending::types::VendStatus;
    use bigdecimal::BigDecimal;

    struct MockReseller;

    #[async_trait]
    impl VendingProvider for MockReseller {
        async fn vend(&self, request: VendRequest) -> VendResult<VendResponse> {
            self.ensure_supported(request.service)?;
            Ok(VendResponse {
                status: VendStatus::Delivered,
                provider_reference: Some("mock-ref".to_string()),
                token: None,
                message: None,
                provider_data: None,
            })
        }

        async fn requery(&self, _tx_ref: &str) -> VendResult<VendResponse> {
            Ok(VendResponse {
                status: VendStatus::Processing,
                provider_reference: None,
                token: None,
                message: None,
                provider_data: None,
            })
        }

        fn name(&self) -> ResellerName {
            ResellerName::Smeplug
        }

        fn supported_services(&self) -> &'static [ServiceKind] {
            &[ServiceKind::Airtime, ServiceKind::Data]
        }
    }

    #[tokio::test]
    async fn unsupported_service_is_rejected() {
        let reseller: Box<dyn VendingProvider> = Box::new(MockReseller);
        let request = VendRequest {
            tx_ref: "vtu-1".to_string(),
            service: ServiceKind::Electricity,
            amount: BigDecimal::from(5000),
            phone: None,
            network: None,
            plan_code: None,
            meter_number: Some("04123456789".to_string()),
            meter_type: None,
            smartcard_number: None,
            bouquet_code: None,
            exam_kind: None,
            quantity: None,
        };

        let result = reseller.vend(request).await;
        assert!(matches!(
            result,
            Err(VendError::UnsupportedService { .. })
        ));
    }
}
