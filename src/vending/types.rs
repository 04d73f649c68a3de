use crate::database::transaction_repository::TransactionType;
use crate::vending::error::VendError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResellerName {
    Smeplug,
    Vtpass,
}

impl ResellerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResellerName::Smeplug => "smeplug",
            ResellerName::Vtpass => "vtpass",
        }
    }
}

impl fmt::Display for ResellerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResellerName {
    type Err = VendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "smeplug" => Ok(ResellerName::Smeplug),
            "vtpass" => Ok(ResellerName::Vtpass),
            _ => Err(VendError::ValidationError {
                message: format!("unsupported reseller: {}", value),
                field: Some("reseller".to_string()),
            }),
        }
    }
}

/// Purchasable service categories. One-to-one with the non-funding
/// transaction types in the ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Airtime,
    Data,
    Electricity,
    CableTv,
    Exam,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Airtime => "airtime",
            ServiceKind::Data => "data",
            ServiceKind::Electricity => "electricity",
            ServiceKind::CableTv => "cable_tv",
            ServiceKind::Exam => "exam",
        }
    }

    pub fn transaction_type(&self) -> TransactionType {
        match self {
            ServiceKind::Airtime => TransactionType::Airtime,
            ServiceKind::Data => TransactionType::Data,
            ServiceKind::Electricity => TransactionType::Electricity,
            ServiceKind::CableTv => TransactionType::CableTv,
            ServiceKind::Exam => TransactionType::Exam,
        }
    }

    pub fn from_transaction_type(tx_type: TransactionType) -> Option<Self> {
        match tx_type {
            TransactionType::Funding => None,
            TransactionType::Airtime => Some(ServiceKind::Airtime),
            TransactionType::Data => Some(ServiceKind::Data),
            TransactionType::Electricity => Some(ServiceKind::Electricity),
            TransactionType::CableTv => Some(ServiceKind::CableTv),
            TransactionType::Exam => Some(ServiceKind::Exam),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = VendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "airtime" => Ok(ServiceKind::Airtime),
            "data" => Ok(ServiceKind::Data),
            "electricity" => Ok(ServiceKind::Electricity),
            "cable_tv" | "cable" => Ok(ServiceKind::CableTv),
            "exam" => Ok(ServiceKind::Exam),
            _ => Err(VendError::ValidationError {
                message: format!("unsupported service: {}", value),
                field: Some("service".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mtn,
    Airtel,
    Glo,
    NineMobile,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mtn => "mtn",
            Network::Airtel => "airtel",
            Network::Glo => "glo",
            Network::NineMobile => "9mobile",
        }
    }
}

impl FromStr for Network {
    type Err = VendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "mtn" => Ok(Network::Mtn),
            "airtel" => Ok(Network::Airtel),
            "glo" => Ok(Network::Glo),
            "9mobile" | "etisalat" => Ok(Network::NineMobile),
            _ => Err(VendError::ValidationError {
                message: format!("unsupported network: {}", value),
                field: Some("network".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeterType {
    Prepaid,
    Postpaid,
}

impl MeterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeterType::Prepaid => "prepaid",
            MeterType::Postpaid => "postpaid",
        }
    }
}

impl FromStr for MeterType {
    type Err = VendError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "prepaid" => Ok(MeterType::Prepaid),
            "postpaid" => Ok(MeterType::Postpaid),
            _ => Err(VendError::ValidationError {
                message: format!("unsupported meter type: {}", value),
                field: Some("meter_type".to_string()),
            }),
        }
    }
}

/// Outcome classes a reseller can report. `Processing` keeps the ledger row
/// pending; the requery worker owns it from there.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VendStatus {
    Delivered,
    Processing,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendRequest {
    pub tx_ref: String,
    pub service: ServiceKind,
    pub amount: BigDecimal,
    pub phone: Option<String>,
    pub network: Option<Network>,
    pub plan_code: Option<String>,
    pub meter_number: Option<String>,
    pub meter_type: Option<MeterType>,
    pub smartcard_number: Option<String>,
    pub bouquet_code: Option<String>,
    pub exam_kind: Option<String>,
    pub quantity: Option<u32>,
}

impl VendRequest {
    pub fn require_phone(&self) -> Result<&str, VendError> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or(VendError::ValidationError {
                message: "phone number is required".to_string(),
                field: Some("phone".to_string()),
            })
    }

    pub fn require_network(&self) -> Result<Network, VendError> {
        self.network.ok_or(VendError::ValidationError {
            message: "network is required".to_string(),
            field: Some("network".to_string()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendResponse {
    pub status: VendStatus,
    pub provider_reference: Option<String>,
    /// Electricity token or exam pin, when the service yields one.
    pub token: Option<String>,
    pub message: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_kind_maps_to_transaction_type_and_back() {
        for kind in [
            ServiceKind::Airtime,
            ServiceKind::Data,
            ServiceKind::Electricity,
            ServiceKind::CableTv,
            ServiceKind::Exam,
        ] {
            let tx_type = kind.transaction_type();
            assert_eq!(ServiceKind::from_transaction_type(tx_type), Some(kind));
        }
        assert_eq!(
            ServiceKind::from_transaction_type(TransactionType::Funding),
            None
        );
    }

    #[test]
    fn network_parsing_accepts_legacy_name() {
        assert_eq!(
            "etisalat".parse::<Network>().ok(),
            Some(Network::NineMobile)
        );
        assert!("verizon".parse::<Network>().is_err());
    }

    #[test]
    fn vend_request_field_requirements() {
        let request = VendRequest {
            tx_ref: "vtu-1".to_string(),
            service: ServiceKind::Airtime,
            amount: BigDecimal::from(100),
            phone: None,
            network: Some(Network::Mtn),
            plan_code: None,
            meter_number: None,
            meter_type: None,
            smartcard_number: None,
            bouquet_code: None,
            exam_kind: None,
            quantity: None,
        };
        assert!(request.require_phone().is_err());
        assert!(request.require_network().is_ok());
    }
}
