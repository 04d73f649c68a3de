//! Smeplug reseller: data bundles and airtime, bearer-token auth.

use crate::vending::error::{VendError, VendResult};
use crate::vending::provider::VendingProvider;
use crate::vending::types::{
    Network, ResellerName, ServiceKind, VendRequest, VendResponse, VendStatus,
};
use crate::vending::utils::VendingHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SmeplugConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl SmeplugConfig {
    pub fn from_env() -> VendResult<Self> {
        let api_key =
            std::env::var("SMEPLUG_API_KEY").map_err(|_| VendError::ValidationError {
                message: "SMEPLUG_API_KEY environment variable is required".to_string(),
                field: Some("SMEPLUG_API_KEY".to_string()),
            })?;

        Ok(Self {
            api_key,
            base_url: std::env::var("SMEPLUG_BASE_URL")
                .unwrap_or_else(|_| "https://smeplug.ng/api/v1".to_string()),
            timeout_secs: std::env::var("SMEPLUG_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
            max_retries: std::env::var("SMEPLUG_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct SmeplugProvider {
    config: SmeplugConfig,
    http: VendingHttpClient,
}

impl SmeplugProvider {
    pub fn new(config: SmeplugConfig) -> VendResult<Self> {
        let http = VendingHttpClient::new(
            "smeplug",
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> VendResult<Self> {
        Self::new(SmeplugConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }

    fn response_to_vend(raw: SmeplugEnvelope) -> VendResult<VendResponse> {
        if !raw.status {
            let message = raw.msg.unwrap_or_else(|| "vend rejected".to_string());
            if message.to_lowercase().contains("insufficient") {
                return Err(VendError::ResellerBalanceError { message });
            }
            return Err(VendError::ProviderError {
                provider: "smeplug".to_string(),
                message,
                provider_code: None,
                retryable: false,
            });
        }

        let data = raw.data.ok_or(VendError::ProviderError {
            provider: "smeplug".to_string(),
            message: "missing data in reseller response".to_string(),
            provider_code: None,
            retryable: false,
        })?;

        Ok(VendResponse {
            status: map_smeplug_status(data.status.as_deref().unwrap_or("pending")),
            provider_reference: data.reference.clone(),
            token: None,
            message: data.msg,
            provider_data: Some(serde_json::json!({
                "reference": data.reference,
                "raw_status": data.status,
            })),
        })
    }
}

/// Smeplug network ids as used by its purchase endpoints.
pub fn smeplug_network_id(network: Network) -> u8 {
    match network {
        Network::Mtn => 1,
        Network::Airtel => 2,
        Network::Glo => 3,
        Network::NineMobile => 4,
    }
}

pub fn map_smeplug_status(status: &str) -> VendStatus {
    match status.to_lowercase().as_str() {
        "success" | "successful" | "delivered" => VendStatus::Delivered,
        "pending" | "processing" => VendStatus::Processing,
        _ => VendStatus::Failed,
    }
}

#[async_trait]
impl VendingProvider for SmeplugProvider {
    async fn vend(&self, request: VendRequest) -> VendResult<VendResponse> {
        self.ensure_supported(request.service)?;
        let phone = request.require_phone()?.to_string();
        let network = request.require_network()?;

        let (path, payload) = match request.service {
            ServiceKind::Data => {
                let plan_id =
                    request
                        .plan_code
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "plan_code is required for data purchases".to_string(),
                            field: Some("plan_code".to_string()),
                        })?;
                (
                    "/data/purchase",
                    serde_json::json!({
                        "network_id": smeplug_network_id(network),
                        "plan_id": plan_id,
                        "phone": phone,
                        "customer_reference": request.tx_ref,
                    }),
                )
            }
            ServiceKind::Airtime => (
                "/airtime/purchase",
                serde_json::json!({
                    "network_id": smeplug_network_id(network),
                    "phone": phone,
                    "amount": request.amount.to_string(),
                    "customer_reference": request.tx_ref,
                }),
            ),
            // ensure_supported rules the rest out
            other => {
                return Err(VendError::UnsupportedService {
                    service: other.to_string(),
                    provider: "smeplug".to_string(),
                })
            }
        };

        let auth = self.auth_header();
        let raw: SmeplugEnvelope = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(path),
                &[
                    ("Authorization", auth.as_str()),
                    ("Content-Type", "application/json"),
                ],
                Some(&payload),
                false,
            )
            .await?;

        info!(tx_ref = %request.tx_ref, service = %request.service, "smeplug vend submitted");
        Self::response_to_vend(raw)
    }

    async fn requery(&self, tx_ref: &str) -> VendResult<VendResponse> {
        let auth = self.auth_header();
        let raw: SmeplugEnvelope = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transactions/status/{}", tx_ref)),
                &[("Authorization", auth.as_str())],
                None,
                true,
            )
            .await?;

        Self::response_to_vend(raw)
    }

    fn name(&self) -> ResellerName {
        ResellerName::Smeplug
    }

    fn supported_services(&self) -> &'static [ServiceKind] {
        &[ServiceKind::Data, ServiceKind::Airtime]
    }
}

#[derive(Debug, Deserialize)]
struct SmeplugEnvelope {
    status: bool,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<SmeplugData>,
}

#[derive(Debug, Deserialize)]
struct SmeplugData {
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(map_smeplug_status("successful"), VendStatus::Delivered);
        assert_eq!(map_smeplug_status("PENDING"), VendStatus::Processing);
        assert_eq!(map_smeplug_status("failed"), VendStatus::Failed);
        assert_eq!(map_smeplug_status("reversed"), VendStatus::Failed);
    }

    #[test]
    fn network_id_mapping() {
        assert_eq!(smeplug_network_id(Network::Mtn), 1);
        assert_eq!(smeplug_network_id(Network::NineMobile), 4);
    }

    #[test]
    fn insufficient_wallet_becomes_balance_error() {
        let raw = SmeplugEnvelope {
            status: false,
            msg: Some("Insufficient wallet balance".to_string()),
            data: None,
        };
        let result = SmeplugProvider::response_to_vend(raw);
        assert!(matches!(
            result,
            Err(VendError::ResellerBalanceError { .. })
        ));
    }

    #[test]
    fn successful_envelope_maps_to_delivered() {
        let raw = SmeplugEnvelope {
            status: true,
            msg: None,
            data: Some(SmeplugData {
                reference: Some("SME-123".to_string()),
                status: Some("success".to_string()),
                msg: None,
            }),
        };
        let response = SmeplugProvider::response_to_vend(raw).expect("should map");
        assert_eq!(response.status, VendStatus::Delivered);
        assert_eq!(response.provider_reference.as_deref(), Some("SME-123"));
    }
}
