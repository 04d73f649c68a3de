use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    Money, PaymentState, ProviderName, StatusRequest, StatusResponse, VirtualAccountDetails,
    VirtualAccountRequest, WebhookEvent, WebhookVerificationResult,
};
use crate::payments::utils::{verify_hmac_sha512_hex, PaymentHttpClient};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub preferred_bank: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: None,
            base_url: "https://api.paystack.co".to_string(),
            preferred_bank: "wema-bank".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl PaystackConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("PAYSTACK_SECRET_KEY").map_err(|_| PaymentError::ValidationError {
                message: "PAYSTACK_SECRET_KEY environment variable is required".to_string(),
                field: Some("PAYSTACK_SECRET_KEY".to_string()),
            })?;

        Ok(Self {
            webhook_secret: std::env::var("PAYSTACK_WEBHOOK_SECRET").ok(),
            base_url: std::env::var("PAYSTACK_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            preferred_bank: std::env::var("PAYSTACK_PREFERRED_BANK")
                .unwrap_or_else(|_| "wema-bank".to_string()),
            timeout_secs: std::env::var("PAYSTACK_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("PAYSTACK_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
            secret_key,
        })
    }
}

pub struct PaystackProvider {
    config: PaystackConfig,
    http: PaymentHttpClient,
}

impl PaystackProvider {
    pub fn new(config: PaystackConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(
            "paystack",
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
        )?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(PaystackConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }
}

/// Paystack reports amounts in kobo. Convert to naira for the ledger.
pub fn kobo_to_naira(kobo: u64) -> Money {
    let naira = BigDecimal::from(kobo) / BigDecimal::from(100);
    Money::ngn(naira.to_string())
}

pub fn map_paystack_status(status: &str) -> PaymentState {
    match status {
        "success" => PaymentState::Success,
        "pending" | "ongoing" | "processing" => PaymentState::Pending,
        "failed" | "abandoned" => PaymentState::Failed,
        "reversed" => PaymentState::Reversed,
        _ => PaymentState::Unknown,
    }
}

#[async_trait]
impl PaymentProvider for PaystackProvider {
    async fn create_virtual_account(
        &self,
        request: VirtualAccountRequest,
    ) -> PaymentResult<VirtualAccountDetails> {
        if request.email.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "email is required for dedicated account creation".to_string(),
                field: Some("email".to_string()),
            });
        }

        // Dedicated accounts hang off a Paystack customer, so create (or
        // fetch, the endpoint is idempotent per email) the customer first.
        let customer_payload = serde_json::json!({
            "email": request.email,
            "first_name": request.first_name,
            "last_name": request.last_name,
            "phone": request.phone,
        });

        let customer: PaystackEnvelope<PaystackCustomerData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/customer"),
                Some(&self.config.secret_key),
                Some(&customer_payload),
                &[("Content-Type", "application/json")],
            )
            .await?;
        if !customer.status {
            return Err(PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: customer.message,
                provider_code: None,
                retryable: false,
            });
        }

        let account_payload = serde_json::json!({
            "customer": customer.data.customer_code,
            "preferred_bank": self.config.preferred_bank,
        });

        let account: PaystackEnvelope<PaystackDedicatedAccountData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/dedicated_account"),
                Some(&self.config.secret_key),
                Some(&account_payload),
                &[("Content-Type", "application/json")],
            )
            .await?;
        if !account.status {
            return Err(PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: account.message,
                provider_code: None,
                retryable: false,
            });
        }

        let data = account.data;
        info!(account_number = %data.account_number, "paystack dedicated account created");

        Ok(VirtualAccountDetails {
            account_number: data.account_number,
            account_name: data.account_name,
            bank_name: data.bank.name,
            provider_reference: Some(customer.data.customer_code),
            provider_data: Some(serde_json::json!({
                "bank_slug": data.bank.slug,
                "account_id": data.id,
            })),
        })
    }

    async fn verify_transaction(&self, request: StatusRequest) -> PaymentResult<StatusResponse> {
        let reference = request.transaction_reference.trim();
        if reference.is_empty() {
            return Err(PaymentError::ValidationError {
                message: "transaction_reference is required".to_string(),
                field: Some("transaction_reference".to_string()),
            });
        }

        let raw: PaystackEnvelope<PaystackVerifyData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/transaction/verify/{}", reference)),
                Some(&self.config.secret_key),
                None,
                &[],
            )
            .await?;
        if !raw.status {
            return Err(PaymentError::ProviderError {
                provider: "paystack".to_string(),
                message: raw.message,
                provider_code: None,
                retryable: false,
            });
        }

        Ok(StatusResponse {
            status: map_paystack_status(&raw.data.status),
            transaction_reference: Some(reference.to_string()),
            provider_reference: raw.data.id.map(|id| id.to_string()),
            amount: Some(kobo_to_naira(raw.data.amount)),
            paid_at: raw.data.paid_at,
            failure_reason: raw.data.gateway_response,
            provider_data: None,
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Paystack
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        let secret = self
            .config
            .webhook_secret
            .as_deref()
            .unwrap_or(&self.config.secret_key);
        let valid = verify_hmac_sha512_hex(payload, secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid paystack signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
        let parsed: JsonValue = serde_json::from_slice(payload).map_err(|e| {
            PaymentError::WebhookVerificationError {
                message: format!("invalid webhook JSON payload: {}", e),
            }
        })?;

        let event_type = parsed
            .get("event")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let data = parsed.get("data");
        let reference = data
            .and_then(|v| v.get("reference"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string());
        let provider_reference = data
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_i64())
            .map(|id| id.to_string());
        let status = data
            .and_then(|v| v.get("status"))
            .and_then(|v| v.as_str())
            .map(map_paystack_status);
        let amount = data
            .and_then(|v| v.get("amount"))
            .and_then(|v| v.as_u64())
            .map(kobo_to_naira);

        Ok(WebhookEvent {
            provider: ProviderName::Paystack,
            event_type,
            transaction_reference: reference,
            provider_reference,
            status,
            amount,
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct PaystackCustomerData {
    customer_code: String,
}

#[derive(Debug, Deserialize)]
struct PaystackDedicatedAccountData {
    id: i64,
    account_number: String,
    account_name: String,
    bank: PaystackBank,
}

#[derive(Debug, Deserialize)]
struct PaystackBank {
    name: String,
    slug: String,
}

#[derive(Debug, Deserialize)]
struct PaystackVerifyData {
    #[serde(default)]
    id: Option<i64>,
    amount: u64,
    status: String,
    #[serde(default)]
    paid_at: Option<String>,
    #[serde(default)]
    gateway_response: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> PaystackProvider {
        PaystackProvider::new(PaystackConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: Some("whsec_test".to_string()),
            ..Default::default()
        })
        .expect("provider init should succeed")
    }

    #[test]
    fn webhook_signature_validation_invalid() {
        let provider = provider();
        let payload = br#"{"event":"charge.success"}"#;
        let result = provider
            .verify_webhook(payload, "invalid_signature")
            .expect("verification should not error");
        assert!(!result.valid);
    }

    #[test]
    fn kobo_conversion_preserves_minor_units() {
        let money = kobo_to_naira(150050);
        assert_eq!(money.currency, "NGN");
        assert_eq!(
            money.as_decimal().unwrap(),
            BigDecimal::from(150050) / BigDecimal::from(100)
        );
    }

    #[test]
    fn parse_webhook_event_extracts_reference_and_amount() {
        let provider = provider();
        let payload = br#"{
            "event": "charge.success",
            "data": {
                "id": 302961,
                "reference": "vtu-abc123",
                "status": "success",
                "amount": 500000
            }
        }"#;

        let event = provider
            .parse_webhook_event(payload)
            .expect("payload should parse");
        assert_eq!(event.event_type, "charge.success");
        assert_eq!(event.transaction_reference.as_deref(), Some("vtu-abc123"));
        assert_eq!(event.provider_reference.as_deref(), Some("302961"));
        assert_eq!(event.status, Some(PaymentState::Success));
        assert_eq!(event.amount.as_ref().map(|m| m.amount.as_str()), Some("5000"));
    }

    #[test]
    fn status_mapping_covers_terminal_states() {
        assert_eq!(map_paystack_status("success"), PaymentState::Success);
        assert_eq!(map_paystack_status("abandoned"), PaymentState::Failed);
        assert_eq!(map_paystack_status("reversed"), PaymentState::Reversed);
        assert_eq!(map_paystack_status("weird"), PaymentState::Unknown);
    }
}
