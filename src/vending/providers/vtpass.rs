//! VTpass reseller: electricity tokens, cable TV and exam pins.
//!
//! Wire format: every request carries a `request_id` (our tx_ref), and the
//! response `code` drives the outcome. "000" means processed, with the nested
//! transaction status authoritative; "099" means still processing.

use crate::vending::error::{VendError, VendResult};
use crate::vending::provider::VendingProvider;
use crate::vending::types::{
    MeterType, ResellerName, ServiceKind, VendRequest, VendResponse, VendStatus,
};
use crate::vending::utils::VendingHttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct VtpassConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl VtpassConfig {
    pub fn from_env() -> VendResult<Self> {
        let api_key = std::env::var("VTPASS_API_KEY").map_err(|_| VendError::ValidationError {
            message: "VTPASS_API_KEY environment variable is required".to_string(),
            field: Some("VTPASS_API_KEY".to_string()),
        })?;
        let secret_key =
            std::env::var("VTPASS_SECRET_KEY").map_err(|_| VendError::ValidationError {
                message: "VTPASS_SECRET_KEY environment variable is required".to_string(),
                field: Some("VTPASS_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            api_key,
            secret_key,
            base_url: std::env::var("VTPASS_BASE_URL")
                .unwrap_or_else(|_| "https://vtpass.com/api".to_string()),
            timeout_secs: std::env::var("VTPASS_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
            max_retries: std::env::var("VTPASS_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
        })
    }
}

pub struct VtpassProvider {
    config: VtpassConfig,
    http: VendingHttpClient,
}

impl VtpassProvider {
    pub fn new(config: VtpassConfig) -> VendResult<Self> {
        let http = VendingHttpClient::new(
            "vtpass",
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> VendResult<Self> {
        Self::new(VtpassConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn build_pay_payload(request: &VendRequest) -> VendResult<JsonValue> {
        match request.service {
            ServiceKind::Electricity => {
                let meter_number =
                    request
                        .meter_number
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "meter_number is required for electricity".to_string(),
                            field: Some("meter_number".to_string()),
                        })?;
                let disco = request
                    .plan_code
                    .as_deref()
                    .ok_or(VendError::ValidationError {
                        message: "plan_code (disco service id) is required for electricity"
                            .to_string(),
                        field: Some("plan_code".to_string()),
                    })?;
                let meter_type = request.meter_type.unwrap_or(MeterType::Prepaid);
                Ok(serde_json::json!({
                    "request_id": request.tx_ref,
                    "serviceID": disco,
                    "billersCode": meter_number,
                    "variation_code": meter_type.as_str(),
                    "amount": request.amount.to_string(),
                    "phone": request.phone,
                }))
            }
            ServiceKind::CableTv => {
                let smartcard =
                    request
                        .smartcard_number
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "smartcard_number is required for cable TV".to_string(),
                            field: Some("smartcard_number".to_string()),
                        })?;
                let service_id =
                    request
                        .plan_code
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "plan_code (cable service id) is required".to_string(),
                            field: Some("plan_code".to_string()),
                        })?;
                let bouquet =
                    request
                        .bouquet_code
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "bouquet_code is required for cable TV".to_string(),
                            field: Some("bouquet_code".to_string()),
                        })?;
                Ok(serde_json::json!({
                    "request_id": request.tx_ref,
                    "serviceID": service_id,
                    "billersCode": smartcard,
                    "variation_code": bouquet,
                    "amount": request.amount.to_string(),
                    "phone": request.phone,
                }))
            }
            ServiceKind::Exam => {
                let exam = request
                    .exam_kind
                    .as_deref()
                    .ok_or(VendError::ValidationError {
                        message: "exam_kind is required for exam pins".to_string(),
                        field: Some("exam_kind".to_string()),
                    })?;
                let variation =
                    request
                        .plan_code
                        .as_deref()
                        .ok_or(VendError::ValidationError {
                            message: "plan_code (exam variation) is required".to_string(),
                            field: Some("plan_code".to_string()),
                        })?;
                Ok(serde_json::json!({
                    "request_id": request.tx_ref,
                    "serviceID": exam,
                    "variation_code": variation,
                    "quantity": request.quantity.unwrap_or(1),
                    "amount": request.amount.to_string(),
                    "phone": request.phone,
                }))
            }
            other => Err(VendError::UnsupportedService {
                service: other.to_string(),
                provider: "vtpass".to_string(),
            }),
        }
    }

    fn response_to_vend(raw: VtpassResponse) -> VendResult<VendResponse> {
        let status = match raw.code.as_str() {
            "000" => raw
                .content
                .as_ref()
                .and_then(|c| c.transactions.as_ref())
                .map(|t| map_vtpass_transaction_status(t.status.as_deref().unwrap_or("pending")))
                .unwrap_or(VendStatus::Processing),
            "099" => VendStatus::Processing,
            _ => VendStatus::Failed,
        };

        if status == VendStatus::Failed {
            let message = raw
                .response_description
                .clone()
                .unwrap_or_else(|| format!("vtpass code {}", raw.code));
            if message.to_lowercase().contains("insufficient") {
                return Err(VendError::ResellerBalanceError { message });
            }
            return Ok(VendResponse {
                status: VendStatus::Failed,
                provider_reference: raw.transaction_id(),
                token: None,
                message: Some(message),
                provider_data: Some(raw.into_json()),
            });
        }

        let token = raw.extract_token();
        let provider_reference = raw.transaction_id();
        let message = raw.response_description.clone();

        Ok(VendResponse {
            status,
            provider_reference,
            token,
            message,
            provider_data: Some(raw.into_json()),
        })
    }
}

pub fn map_vtpass_transaction_status(status: &str) -> VendStatus {
    match status.to_lowercase().as_str() {
        "delivered" => VendStatus::Delivered,
        "pending" | "initiated" | "processing" => VendStatus::Processing,
        _ => VendStatus::Failed,
    }
}

#[async_trait]
impl VendingProvider for VtpassProvider {
    async fn vend(&self, request: VendRequest) -> VendResult<VendResponse> {
        self.ensure_supported(request.service)?;
        let payload = Self::build_pay_payload(&request)?;

        let raw: VtpassResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/pay"),
                &[
                    ("api-key", self.config.api_key.as_str()),
                    ("secret-key", self.config.secret_key.as_str()),
                    ("Content-Type", "application/json"),
                ],
                Some(&payload),
                false,
            )
            .await?;

        info!(tx_ref = %request.tx_ref, service = %request.service, code = %raw.code, "vtpass vend submitted");
        Self::response_to_vend(raw)
    }

    async fn requery(&self, tx_ref: &str) -> VendResult<VendResponse> {
        let payload = serde_json::json!({ "request_id": tx_ref });

        let raw: VtpassResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/requery"),
                &[
                    ("api-key", self.config.api_key.as_str()),
                    ("secret-key", self.config.secret_key.as_str()),
                    ("Content-Type", "application/json"),
                ],
                Some(&payload),
                true,
            )
            .await?;

        Self::response_to_vend(raw)
    }

    fn name(&self) -> ResellerName {
        ResellerName::Vtpass
    }

    fn supported_services(&self) -> &'static [ServiceKind] {
        &[
            ServiceKind::Electricity,
            ServiceKind::CableTv,
            ServiceKind::Exam,
        ]
    }
}

#[derive(Debug, Deserialize)]
struct VtpassResponse {
    code: String,
    #[serde(default)]
    response_description: Option<String>,
    #[serde(default)]
    purchased_code: Option<String>,
    #[serde(default)]
    content: Option<VtpassContent>,
    #[serde(default, rename = "cards")]
    cards: Option<Vec<VtpassCard>>,
}

#[derive(Debug, Deserialize)]
struct VtpassContent {
    #[serde(default)]
    transactions: Option<VtpassTransaction>,
}

#[derive(Debug, Deserialize)]
struct VtpassTransaction {
    #[serde(default)]
    status: Option<String>,
    #[serde(default, rename = "transactionId")]
    transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VtpassCard {
    #[serde(default, rename = "Pin")]
    pin: Option<String>,
}

impl VtpassResponse {
    fn transaction_id(&self) -> Option<String> {
        self.content
            .as_ref()
            .and_then(|c| c.transactions.as_ref())
            .and_then(|t| t.transaction_id.clone())
    }

    /// Electricity token or exam pin(s), whichever the payload carries.
    fn extract_token(&self) -> Option<String> {
        if let Some(code) = self
            .purchased_code
            .as_ref()
            .filter(|c| !c.trim().is_empty())
        {
            return Some(code.clone());
        }
        let pins: Vec<String> = self
            .cards
            .as_ref()?
            .iter()
            .filter_map(|c| c.pin.clone())
            .collect();
        if pins.is_empty() {
            None
        } else {
            Some(pins.join(","))
        }
    }

    fn into_json(self) -> JsonValue {
        serde_json::json!({
            "code": self.code,
            "response_description": self.response_description,
            "purchased_code": self.purchased_code,
            "transaction_id": self.content
                .as_ref()
                .and_then(|c| c.transactions.as_ref())
                .and_then(|t| t.transaction_id.clone()),
        })
    }
}
