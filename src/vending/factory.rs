use crate::vending::error::{VendError, VendResult};
use crate::vending::provider::VendingProvider;
use crate::vending::providers::{SmeplugProvider, VtpassProvider};
use crate::vending::types::{ResellerName, ServiceKind};
use std::collections::HashMap;
use std::str::FromStr;

/// Routes each service category to a reseller. Defaults follow the reseller
/// capabilities (smeplug for data/airtime, vtpass for bills); `VENDOR_*` env
/// vars override per service.
#[derive(Debug, Clone)]
pub struct VendingFactoryConfig {
    pub routes: HashMap<ServiceKind, ResellerName>,
}

impl Default for VendingFactoryConfig {
    fn default() -> Self {
        let mut routes = HashMap::new();
        routes.insert(ServiceKind::Data, ResellerName::Smeplug);
        routes.insert(ServiceKind::Airtime, ResellerName::Smeplug);
        routes.insert(ServiceKind::Electricity, ResellerName::Vtpass);
        routes.insert(ServiceKind::CableTv, ResellerName::Vtpass);
        routes.insert(ServiceKind::Exam, ResellerName::Vtpass);
        Self { routes }
    }
}

impl VendingFactoryConfig {
    pub fn from_env() -> VendResult<Self> {
        let mut config = Self::default();
        let overrides = [
            (ServiceKind::Data, "VENDOR_DATA"),
            (ServiceKind::Airtime, "VENDOR_AIRTIME"),
            (ServiceKind::Electricity, "VENDOR_ELECTRICITY"),
            (ServiceKind::CableTv, "VENDOR_CABLE_TV"),
            (ServiceKind::Exam, "VENDOR_EXAM"),
        ];
        for (service, var) in overrides {
            if let Ok(value) = std::env::var(var) {
                config
                    .routes
                    .insert(service, ResellerName::from_str(&value)?);
            }
        }
        Ok(config)
    }
}

pub struct VendingProviderFactory {
    config: VendingFactoryConfig,
}

impl VendingProviderFactory {
    pub fn from_env() -> VendResult<Self> {
        Ok(Self {
            config: VendingFactoryConfig::from_env()?,
        })
    }

    pub fn with_config(config: VendingFactoryConfig) -> Self {
        Self { config }
    }

    pub fn reseller_for(&self, service: ServiceKind) -> VendResult<ResellerName> {
        self.config
            .routes
            .get(&service)
            .copied()
            .ok_or(VendError::UnsupportedService {
                service: service.to_string(),
                provider: "factory".to_string(),
            })
    }

    pub fn get_provider(&self, service: ServiceKind) -> VendResult<Box<dyn VendingProvider>> {
        let reseller = self.reseller_for(service)?;
        let provider = self.build(reseller)?;
        provider.ensure_supported(service)?;
        Ok(provider)
    }

    pub fn build(&self, reseller: ResellerName) -> VendResult<Box<dyn VendingProvider>> {
        match reseller {
            ResellerName::Smeplug => Ok(Box::new(SmeplugProvider::from_env()?)),
            ResellerName::Vtpass => Ok(Box::new(VtpassProvider::from_env()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_routing_sends_bills_to_vtpass() {
        let factory = VendingProviderFactory::with_config(VendingFactoryConfig::default());
        assert_eq!(
            factory.reseller_for(ServiceKind::Electricity).unwrap(),
            ResellerName::Vtpass
        );
        assert_eq!(
            factory.reseller_for(ServiceKind::Data).unwrap(),
            ResellerName::Smeplug
        );
    }

    #[test]
    fn reseller_name_parsing_works() {
        assert!(matches!(
            ResellerName::from_str("vtpass"),
            Ok(ResellerName::Vtpass)
        ));
        assert!(ResellerName::from_str("unknown").is_err());
    }
}
