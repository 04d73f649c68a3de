mod webhook_tests {
    use hmac::{Hmac, Mac};
    use serde_json::json;
    use sha2::Sha512;

    use vtuflow_backend::payments::provider::PaymentProvider;
    use vtuflow_backend::payments::providers::paystack::{
        kobo_to_naira, map_paystack_status, PaystackConfig, PaystackProvider,
    };
    use vtuflow_backend::payments::types::PaymentState;
    use vtuflow_backend::services::webhook_processor::{
        extract_event_id, WebhookProcessorError,
    };

    fn test_provider() -> PaystackProvider {
        PaystackProvider::new(PaystackConfig {
            secret_key: "sk_test_secret".to_string(),
            webhook_secret: None,
            base_url: "https://api.paystack.co".to_string(),
            preferred_bank: "wema-bank".to_string(),
            timeout_secs: 5,
            max_retries: 0,
        })
        .unwrap()
    }

    fn sign(body: &[u8], key: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_webhook_error_display() {
        let err = WebhookProcessorError::InvalidSignature;
        assert_eq!(err.to_string(), "Invalid signature");

        let err = WebhookProcessorError::AlreadyProcessed;
        assert_eq!(err.to_string(), "Already processed");

        let err = WebhookProcessorError::UnknownProvider("test".to_string());
        assert_eq!(err.to_string(), "Unknown provider: test");
    }

    #[test]
    fn test_event_id_extraction() {
        let payload = json!({
            "id": 67890,
            "event": "charge.success",
            "data": {
                "reference": "vtu-abc123",
                "status": "success"
            }
        });
        assert_eq!(extract_event_id(&payload), Some("67890".to_string()));

        let payload = json!({
            "event": "charge.success",
            "data": { "id": 42, "reference": "vtu-abc123" }
        });
        assert_eq!(extract_event_id(&payload), Some("42".to_string()));
    }

    #[test]
    fn test_signature_verification_accepts_valid() {
        let provider = test_provider();
        let body = br#"{"event":"charge.success","data":{"reference":"vtu-1"}}"#;
        let signature = sign(body, "sk_test_secret");

        let result = provider.verify_webhook(body, &signature).unwrap();
        assert!(result.valid);
    }

    #[test]
    fn test_signature_verification_rejects_tampered_body() {
        let provider = test_provider();
        let body = br#"{"event":"charge.success","data":{"reference":"vtu-1"}}"#;
        let signature = sign(body, "sk_test_secret");

        let tampered = br#"{"event":"charge.success","data":{"reference":"vtu-2"}}"#;
        let result = provider.verify_webhook(tampered, &signature).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn test_webhook_event_parsing() {
        let provider = test_provider();
        let body = serde_json::to_vec(&json!({
            "event": "charge.success",
            "data": {
                "id": 302961,
                "reference": "vtu-9f1c",
                "status": "success",
                "amount": 250000,
                "customer": { "customer_code": "CUS_xr58yrr2ujlgeze" }
            }
        }))
        .unwrap();

        let event = provider.parse_webhook_event(&body).unwrap();
        assert_eq!(event.event_type, "charge.success");
        assert_eq!(event.transaction_reference.as_deref(), Some("vtu-9f1c"));
        assert_eq!(event.status, Some(PaymentState::Success));
        // 250000 kobo is 2500 naira
        let amount = event.amount.unwrap().as_decimal().unwrap();
        assert_eq!(amount, bigdecimal::BigDecimal::from(2500));
    }

    #[test]
    fn test_kobo_conversion() {
        let money = kobo_to_naira(5000);
        assert_eq!(money.as_decimal().unwrap(), bigdecimal::BigDecimal::from(50));
    }

    #[test]
    fn test_paystack_status_mapping() {
        assert_eq!(map_paystack_status("success"), PaymentState::Success);
        assert_eq!(map_paystack_status("failed"), PaymentState::Failed);
        assert_eq!(map_paystack_status("abandoned"), PaymentState::Failed);
        assert_eq!(map_paystack_status("pending"), PaymentState::Pending);
        assert_eq!(map_paystack_status("reversed"), PaymentState::Reversed);
        assert_eq!(map_paystack_status("whatever"), PaymentState::Unknown);
    }
}
