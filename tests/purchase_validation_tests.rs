mod purchase_validation_tests {
    use uuid::Uuid;

    use vtuflow_backend::api::purchase::{build_order, PurchaseRequest};
    use vtuflow_backend::error::ErrorCode;
    use vtuflow_backend::vending::types::{MeterType, Network, ServiceKind};

    fn request(service: &str) -> PurchaseRequest {
        PurchaseRequest {
            user_id: Uuid::new_v4(),
            service: service.to_string(),
            amount: "1000".to_string(),
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
    fn test_unknown_service_rejected() {
        let err = build_order(request("crypto")).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_airtime_order_builds() {
        let mut req = request("airtime");
        req.phone = Some("08031234567".to_string());
        req.network = Some("9mobile".to_string());

        let order = build_order(req).unwrap();
        assert_eq!(order.service, ServiceKind::Airtime);
        assert_eq!(order.network, Some(Network::NineMobile));
        assert_eq!(order.phone.as_deref(), Some("08031234567"));
    }

    #[test]
    fn test_network_alias_etisalat() {
        let mut req = request("airtime");
        req.phone = Some("08091234567".to_string());
        req.network = Some("etisalat".to_string());

        let order = build_order(req).unwrap();
        assert_eq!(order.network, Some(Network::NineMobile));
    }

    #[test]
    fn test_missing_field_reports_validation_error() {
        let mut req = request("data");
        req.phone = Some("08031234567".to_string());
        req.network = Some("mtn".to_string());
        // plan_code missing

        let err = build_order(req).unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert!(err.user_message().contains("plan_code"));
    }

    #[test]
    fn test_electricity_order_builds() {
        let mut req = request("electricity");
        req.plan_code = Some("eko-electric".to_string());
        req.meter_number = Some("04123456789".to_string());
        req.meter_type = Some("postpaid".to_string());

        let order = build_order(req).unwrap();
        assert_eq!(order.service, ServiceKind::Electricity);
        assert_eq!(order.meter_type, Some(MeterType::Postpaid));
        assert_eq!(order.plan_code.as_deref(), Some("eko-electric"));
    }

    #[test]
    fn test_exam_order_builds_with_quantity() {
        let mut req = request("exam");
        req.exam_kind = Some("waec".to_string());
        req.plan_code = Some("waec-result-checker".to_string());
        req.quantity = Some(2);

        let order = build_order(req).unwrap();
        assert_eq!(order.service, ServiceKind::Exam);
        assert_eq!(order.quantity, Some(2));
    }

    #[test]
    fn test_whitespace_only_field_treated_as_missing() {
        let mut req = request("airtime");
        req.phone = Some("   ".to_string());
        req.network = Some("mtn".to_string());

        let err = build_order(req).unwrap_err();
        assert!(err.user_message().contains("phone"));
    }

    #[test]
    fn test_negative_amount_passes_parse_not_validation() {
        // Sign checks belong to the settlement engine; the builder only
        // guarantees the amount is a decimal.
        let mut req = request("airtime");
        req.phone = Some("08031234567".to_string());
        req.network = Some("mtn".to_string());
        req.amount = "-10".to_string();

        let order = build_order(req).unwrap();
        assert!(order.amount < bigdecimal::BigDecimal::from(0));
    }
}
