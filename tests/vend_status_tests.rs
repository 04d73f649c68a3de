mod vend_status_tests {
    use vtuflow_backend::vending::providers::smeplug::{map_smeplug_status, smeplug_network_id};
    use vtuflow_backend::vending::providers::vtpass::map_vtpass_transaction_status;
    use vtuflow_backend::vending::types::{Network, ServiceKind, VendStatus};

    #[test]
    fn test_smeplug_network_ids() {
        assert_eq!(smeplug_network_id(Network::Mtn), 1);
        assert_eq!(smeplug_network_id(Network::Airtel), 2);
        assert_eq!(smeplug_network_id(Network::Glo), 3);
        assert_eq!(smeplug_network_id(Network::NineMobile), 4);
    }

    #[test]
    fn test_smeplug_status_mapping() {
        assert_eq!(map_smeplug_status("delivered"), VendStatus::Delivered);
        assert_eq!(map_smeplug_status("success"), VendStatus::Delivered);
        assert_eq!(map_smeplug_status("pending"), VendStatus::Processing);
        assert_eq!(map_smeplug_status("failed"), VendStatus::Failed);
    }

    #[test]
    fn test_vtpass_status_mapping() {
        assert_eq!(
            map_vtpass_transaction_status("delivered"),
            VendStatus::Delivered
        );
        assert_eq!(
            map_vtpass_transaction_status("pending"),
            VendStatus::Processing
        );
        assert_eq!(
            map_vtpass_transaction_status("initiated"),
            VendStatus::Processing
        );
        assert_eq!(map_vtpass_transaction_status("failed"), VendStatus::Failed);
        assert_eq!(
            map_vtpass_transaction_status("reversed"),
            VendStatus::Failed
        );
    }

    #[test]
    fn test_service_transaction_type_round_trip() {
        for service in [
            ServiceKind::Airtime,
            ServiceKind::Data,
            ServiceKind::Electricity,
            ServiceKind::CableTv,
            ServiceKind::Exam,
        ] {
            let tx_type = service.transaction_type();
            assert_eq!(ServiceKind::from_transaction_type(tx_type), Some(service));
        }
    }
}
