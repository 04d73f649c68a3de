//! POST /api/purchase

use axum::{extract::State, http::HeaderMap, Json};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::settlement::{PurchaseOrder, PurchaseOutcome};
use crate::vending::types::{MeterType, Network, ServiceKind};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: Uuid,
    pub service: String,
    pub amount: String,
    pub phone: Option<String>,
    pub network: Option<String>,
    pub plan_code: Option<String>,
    pub meter_number: Option<String>,
    pub meter_type: Option<String>,
    pub smartcard_number: Option<String>,
    pub bouquet_code: Option<String>,
    pub exam_kind: Option<String>,
    pub quantity: Option<u32>,
}

fn require(value: &Option<String>, field: &str) -> Result<String, AppError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::validation(ValidationError::MissingField {
            field: field.to_string(),
        })),
    }
}

/// Turn the raw request into a validated order. Per-service required fields
/// are enforced here so the settlement engine only ever sees complete orders.
pub fn build_order(request: PurchaseRequest) -> Result<PurchaseOrder, AppError> {
    let service = ServiceKind::from_str(&request.service)?;

    let amount = BigDecimal::from_str(request.amount.trim()).map_err(|_| {
        AppError::validation(ValidationError::InvalidAmount {
            amount: request.amount.clone(),
            reason: "not a valid decimal number".to_string(),
        })
    })?;

    let mut order = PurchaseOrder {
        user_id: request.user_id,
        service,
        amount,
        phone: None,
        network: None,
        plan_code: None,
        meter_number: None,
        meter_type: None,
        smartcard_number: None,
        bouquet_code: None,
        exam_kind: None,
        quantity: request.quantity,
    };

    match service {
        ServiceKind::Airtime => {
            order.phone = Some(require(&request.phone, "phone")?);
            order.network = Some(Network::from_str(&require(&request.network, "network")?)?);
        }
        ServiceKind::Data => {
            order.phone = Some(require(&request.phone, "phone")?);
            order.network = Some(Network::from_str(&require(&request.network, "network")?)?);
            order.plan_code = Some(require(&request.plan_code, "plan_code")?);
        }
        ServiceKind::Electricity => {
            order.meter_number = Some(require(&request.meter_number, "meter_number")?);
            order.meter_type = Some(MeterType::from_str(&require(
                &request.meter_type,
                "meter_type",
            )?)?);
            order.plan_code = Some(require(&request.plan_code, "plan_code")?);
            order.phone = request.phone.clone();
        }
        ServiceKind::CableTv => {
            order.smartcard_number = Some(require(&request.smartcard_number, "smartcard_number")?);
            order.bouquet_code = Some(require(&request.bouquet_code, "bouquet_code")?);
            order.plan_code = Some(require(&request.plan_code, "plan_code")?);
            order.phone = request.phone.clone();
        }
        ServiceKind::Exam => {
            order.exam_kind = Some(require(&request.exam_kind, "exam_kind")?);
            order.plan_code = Some(require(&request.plan_code, "plan_code")?);
            order.phone = request.phone.clone();
        }
    }

    Ok(order)
}

pub async fn handle_purchase(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseOutcome>, AppError> {
    let request_id = get_request_id_from_headers(&headers);

    let order = build_order(request).map_err(|e| match &request_id {
        Some(id) => e.with_request_id(id.clone()),
        None => e,
    })?;

    let outcome = state.engine.purchase(order).await.map_err(|e| match &request_id {
        Some(id) => e.with_request_id(id.clone()),
        None => e,
    })?;

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn base_request(service: &str) -> PurchaseRequest {
        PurchaseRequest {
            user_id: Uuid::new_v4(),
            service: service.to_string(),
            amount: "500".to_string(),
            phone: None,
            network: None,
            plan_code: None,
            meter_number: None,
            meter_type: None,
            smartcard_number: None,
            bouquet_code: None,
            exam_kind: None,
            quantity: None,
        }
    }

    #[test]
    fn airtime_requires_phone_and_network() {
        let err = build_order(base_request("airtime")).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);

        let mut req = base_request("airtime");
        req.phone = Some("08031234567".to_string());
        req.network = Some("mtn".to_string());
        let order = build_order(req).unwrap();
        assert_eq!(order.service, ServiceKind::Airtime);
        assert_eq!(order.network, Some(Network::Mtn));
    }

    #[test]
    fn data_requires_plan_code() {
        let mut req = base_request("data");
        req.phone = Some("08031234567".to_string());
        req.network = Some("glo".to_string());
        assert!(build_order(req).is_err());

        let mut req = base_request("data");
        req.phone = Some("08031234567".to_string());
        req.network = Some("glo".to_string());
        req.plan_code = Some("glo-1gb-30d".to_string());
        let order = build_order(req).unwrap();
        assert_eq!(order.plan_code.as_deref(), Some("glo-1gb-30d"));
    }

    #[test]
    fn electricity_requires_meter_details() {
        let mut req = base_request("electricity");
        req.plan_code = Some("ikeja-electric".to_string());
        req.meter_number = Some("45028837172".to_string());
        assert!(build_order(req).is_err());

        let mut req = base_request("electricity");
        req.plan_code = Some("ikeja-electric".to_string());
        req.meter_number = Some("45028837172".to_string());
        req.meter_type = Some("prepaid".to_string());
        let order = build_order(req).unwrap();
        assert_eq!(order.meter_type, Some(MeterType::Prepaid));
    }

    #[test]
    fn rejects_bad_amount() {
        let mut req = base_request("airtime");
        req.phone = Some("08031234567".to_string());
        req.network = Some("airtel".to_string());
        req.amount = "abc".to_string();
        let err = build_order(req).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn accepts_cable_alias() {
        let mut req = base_request("cable");
        req.smartcard_number = Some("7032400223".to_string());
        req.bouquet_code = Some("dstv-compact".to_string());
        req.plan_code = Some("dstv".to_string());
        let order = build_order(req).unwrap();
        assert_eq!(order.service, ServiceKind::CableTv);
    }
}
