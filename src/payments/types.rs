use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Paystack,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Paystack => "paystack",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "paystack" => Ok(ProviderName::Paystack),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn ngn(amount: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: "NGN".to_string(),
        }
    }

    pub fn as_decimal(&self) -> Result<BigDecimal, PaymentError> {
        BigDecimal::from_str(&self.amount).map_err(|_| PaymentError::ValidationError {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some("amount".to_string()),
        })
    }

    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed = self.as_decimal()?;
        if parsed <= BigDecimal::from(0) {
            return Err(PaymentError::ValidationError {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Success,
    Failed,
    Reversed,
    Unknown,
}

/// Request to provision a dedicated virtual funding account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAccountRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualAccountDetails {
    pub account_number: String,
    pub account_name: String,
    pub bank_name: String,
    pub provider_reference: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub transaction_reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: PaymentState,
    pub transaction_reference: Option<String>,
    pub provider_reference: Option<String>,
    pub amount: Option<Money>,
    pub paid_at: Option<String>,
    pub failure_reason: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub provider: ProviderName,
    pub event_type: String,
    pub transaction_reference: Option<String>,
    pub provider_reference: Option<String>,
    pub status: Option<PaymentState>,
    pub amount: Option<Money>,
    pub payload: JsonValue,
    pub received_at: String,
}
