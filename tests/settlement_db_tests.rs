//! Database-backed settlement tests. All tests are ignored by default and
//! need a Postgres instance reachable via DATABASE_URL.

mod settlement_db_tests {
    use std::str::FromStr;
    use std::sync::Arc;

    use async_trait::async_trait;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use serde_json::json;
    use sqlx::PgPool;
    use uuid::Uuid;

    use vtuflow_backend::database::transaction_repository::{
        NewTransaction, TransactionRepository, TransactionStatus, TransactionType,
    };
    use vtuflow_backend::database::user_repository::UserRepository;
    use vtuflow_backend::payments::error::PaymentResult;
    use vtuflow_backend::payments::provider::PaymentProvider;
    use vtuflow_backend::payments::types::{
        Money, PaymentState, ProviderName, StatusRequest, StatusResponse, VirtualAccountDetails,
        VirtualAccountRequest, WebhookEvent, WebhookVerificationResult,
    };
    use vtuflow_backend::services::settlement::{PurchaseOrder, SettlementEngine};
    use vtuflow_backend::services::webhook_processor::{WebhookProcessor, WebhookProcessorError};
    use vtuflow_backend::vending::factory::{VendingFactoryConfig, VendingProviderFactory};
    use vtuflow_backend::vending::types::{Network, ServiceKind};

    async fn setup_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for DB tests");
        let pool = PgPool::connect(&url).await.expect("connect to database");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");
        pool
    }

    async fn create_user(pool: &PgPool, balance: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (user_id, email, first_name, last_name, balance)
            VALUES ($1, $2, 'Ada', 'Obi', $3)
            "#,
        )
        .bind(user_id)
        .bind(format!("{}@example.com", user_id.simple()))
        .bind(BigDecimal::from_str(balance).unwrap())
        .execute(pool)
        .await
        .expect("insert user");
        user_id
    }

    async fn insert_pending_vend(pool: &PgPool, user_id: Uuid, amount: &str) -> String {
        let mut conn = pool.acquire().await.expect("acquire connection");
        let tx_ref = format!("vtu-{}", Uuid::new_v4().simple());
        let amount = BigDecimal::from_str(amount).unwrap();
        let new = NewTransaction {
            user_id,
            tx_ref: tx_ref.clone(),
            tx_type: TransactionType::Airtime,
            amount: amount.clone(),
            balance_before: amount.clone(),
            balance_after: BigDecimal::from(0),
            provider: Some("smeplug".to_string()),
            metadata: json!({}),
        };
        TransactionRepository::create(&mut conn, &new)
            .await
            .expect("insert pending transaction");
        tx_ref
    }

    /// Canned funding processor: every webhook verifies, every transaction
    /// checks out at 2500 naira.
    struct StaticFundingProvider;

    #[async_trait]
    impl PaymentProvider for StaticFundingProvider {
        async fn create_virtual_account(
            &self,
            request: VirtualAccountRequest,
        ) -> PaymentResult<VirtualAccountDetails> {
            Ok(VirtualAccountDetails {
                account_number: "0123456789".to_string(),
                account_name: format!("{} {}", request.first_name, request.last_name),
                bank_name: "Wema Bank".to_string(),
                provider_reference: Some("CUS_static".to_string()),
                provider_data: None,
            })
        }

        async fn verify_transaction(
            &self,
            request: StatusRequest,
        ) -> PaymentResult<StatusResponse> {
            Ok(StatusResponse {
                status: PaymentState::Success,
                transaction_reference: Some(request.transaction_reference),
                provider_reference: None,
                amount: Some(Money::ngn("2500")),
                paid_at: None,
                failure_reason: None,
                provider_data: None,
            })
        }

        fn name(&self) -> ProviderName {
            ProviderName::Paystack
        }

        fn verify_webhook(
            &self,
            _payload: &[u8],
            _signature: &str,
        ) -> PaymentResult<WebhookVerificationResult> {
            Ok(WebhookVerificationResult {
                valid: true,
                reason: None,
            })
        }

        fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<WebhookEvent> {
            let payload: serde_json::Value = serde_json::from_slice(payload).unwrap();
            Ok(WebhookEvent {
                provider: ProviderName::Paystack,
                event_type: payload["event"].as_str().unwrap_or_default().to_string(),
                transaction_reference: payload["data"]["reference"]
                    .as_str()
                    .map(|s| s.to_string()),
                provider_reference: None,
                status: Some(PaymentState::Success),
                amount: None,
                payload,
                received_at: Utc::now().to_rfc3339(),
            })
        }
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn debit_guard_keeps_balance_non_negative() {
        let pool = setup_pool().await;
        let user_id = create_user(&pool, "100").await;
        let users = UserRepository::new(pool.clone());

        let mut dbtx = pool.begin().await.unwrap();
        let over = UserRepository::debit_balance(&mut dbtx, user_id, &BigDecimal::from(150))
            .await
            .unwrap();
        assert!(over.is_none(), "debit past the balance must be rejected");
        dbtx.rollback().await.unwrap();

        assert_eq!(users.get_balance(user_id).await.unwrap(), BigDecimal::from(100));

        let mut dbtx = pool.begin().await.unwrap();
        let within = UserRepository::debit_balance(&mut dbtx, user_id, &BigDecimal::from(60))
            .await
            .unwrap();
        assert_eq!(within, Some(BigDecimal::from(40)));
        dbtx.commit().await.unwrap();

        assert_eq!(users.get_balance(user_id).await.unwrap(), BigDecimal::from(40));
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn duplicate_funding_webhook_is_a_noop() {
        let pool = setup_pool().await;
        let user_id = create_user(&pool, "0").await;
        let users = UserRepository::new(pool.clone());

        let customer_code = format!("CUS_{}", Uuid::new_v4().simple());
        sqlx::query(
            r#"
            INSERT INTO virtual_accounts
                (account_id, user_id, account_number, account_name, bank_name,
                 provider, provider_reference)
            VALUES ($1, $2, '0123456789', 'Ada Obi', 'Wema Bank', 'paystack', $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&customer_code)
        .execute(&pool)
        .await
        .unwrap();

        let processor = WebhookProcessor::new(pool.clone(), Arc::new(StaticFundingProvider));
        let body = serde_json::to_vec(&json!({
            "id": Utc::now().timestamp_nanos_opt().unwrap(),
            "event": "charge.success",
            "data": {
                "reference": format!("vtu-{}", Uuid::new_v4().simple()),
                "customer": { "customer_code": customer_code }
            }
        }))
        .unwrap();

        processor
            .process_webhook("paystack", Some("sig"), &body)
            .await
            .expect("first delivery settles");
        assert_eq!(users.get_balance(user_id).await.unwrap(), BigDecimal::from(2500));

        let second = processor.process_webhook("paystack", Some("sig"), &body).await;
        assert!(matches!(second, Err(WebhookProcessorError::AlreadyProcessed)));
        assert_eq!(
            users.get_balance(user_id).await.unwrap(),
            BigDecimal::from(2500),
            "duplicate delivery must not credit again"
        );
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn requery_exhaustion_flags_manual_review_and_unlocks_refund() {
        let pool = setup_pool().await;
        let user_id = create_user(&pool, "0").await;
        let users = UserRepository::new(pool.clone());
        let transactions = TransactionRepository::new(pool.clone());
        let tx_ref = insert_pending_vend(&pool, user_id, "500").await;

        let first = transactions
            .record_requery_attempt(&tx_ref, 2)
            .await
            .unwrap()
            .expect("row still pending");
        assert_eq!(first.requery_attempts, 1);
        assert_eq!(first.status().unwrap(), TransactionStatus::Pending);
        assert!(!first.needs_manual_review());

        let second = transactions
            .record_requery_attempt(&tx_ref, 2)
            .await
            .unwrap()
            .expect("row still pending");
        assert_eq!(second.requery_attempts, 2);
        assert_eq!(second.status().unwrap(), TransactionStatus::Failed);
        assert!(second.needs_manual_review());

        // A terminal row is out of the sweep's reach.
        let third = transactions.record_requery_attempt(&tx_ref, 2).await.unwrap();
        assert!(third.is_none());

        // Failed means the operator refund can now compensate the debit.
        let factory = Arc::new(VendingProviderFactory::with_config(
            VendingFactoryConfig::default(),
        ));
        let engine = SettlementEngine::new(pool.clone(), factory);
        let refunded = engine.refund(&tx_ref).await.expect("refund reachable");
        assert!(refunded.is_refunded());
        assert_eq!(users.get_balance(user_id).await.unwrap(), BigDecimal::from(500));
    }

    #[tokio::test]
    #[ignore] // Requires database running
    async fn reseller_misconfiguration_fails_before_any_debit() {
        std::env::remove_var("SMEPLUG_API_KEY");

        let pool = setup_pool().await;
        let user_id = create_user(&pool, "1000").await;
        let users = UserRepository::new(pool.clone());
        let transactions = TransactionRepository::new(pool.clone());

        let factory = Arc::new(VendingProviderFactory::with_config(
            VendingFactoryConfig::default(),
        ));
        let engine = SettlementEngine::new(pool.clone(), factory);

        let order = PurchaseOrder {
            user_id,
            service: ServiceKind::Airtime,
            amount: BigDecimal::from(100),
            phone: Some("08031234567".to_string()),
            network: Some(Network::Mtn),
            plan_code: None,
            meter_number: None,
            meter_type: None,
            smartcard_number: None,
            bouquet_code: None,
            exam_kind: None,
            quantity: None,
        };
        engine
            .purchase(order)
            .await
            .expect_err("missing reseller credentials must fail the purchase");

        assert_eq!(
            users.get_balance(user_id).await.unwrap(),
            BigDecimal::from(1000),
            "no money may move when the reseller client cannot be built"
        );
        let rows = transactions.find_recent_by_user(user_id, 10).await.unwrap();
        assert!(rows.is_empty(), "no ledger row may be written either");
    }
}
