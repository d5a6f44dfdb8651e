//! Integration tests for QueryManager against the in-memory log.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::AggregateId;
use domain::merchant::DepositSource;
use domain::voucher::VoucherGeneratedData;
use domain::{
    CommandHandler, Contract, DomainEvent, Estate, EstateEvent, Merchant, Operator, ProductId,
    Voucher,
};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use projections::{ProjectionProcessor, ReadModels};
use query::{QueryError, QueryManager};
use rust_decimal_macros::dec;

struct Harness {
    store: InMemoryEventStore,
    read_models: ReadModels,
    manager: QueryManager<InMemoryEventStore>,
}

impl Harness {
    fn new() -> Self {
        let store = InMemoryEventStore::new();
        let read_models = ReadModels::default();
        let manager = QueryManager::new(store.clone(), read_models.clone());
        Self {
            store,
            read_models,
            manager,
        }
    }

    async fn catch_up(&self) {
        let mut processor = ProjectionProcessor::new(self.store.clone());
        for family in self.read_models.families() {
            processor.register_shared(family);
        }
        processor.run_catch_up().await.unwrap();
    }

    async fn estate(&self, name: &str) -> AggregateId {
        let estate_id = AggregateId::new();
        let estates: CommandHandler<_, Estate> = CommandHandler::new(self.store.clone());
        estates
            .execute(estate_id, |e| e.create(estate_id, name))
            .await
            .unwrap();
        estate_id
    }

    async fn merchant(&self, estate_id: AggregateId, name: &str) -> AggregateId {
        let merchant_id = AggregateId::new();
        let merchants: CommandHandler<_, Merchant> = CommandHandler::new(self.store.clone());
        merchants
            .execute(merchant_id, |m| m.create(merchant_id, estate_id, name))
            .await
            .unwrap();
        merchant_id
    }
}

#[tokio::test]
async fn unknown_estate_is_not_found() {
    let h = Harness::new();

    let err = h.manager.get_estate(AggregateId::new()).await.unwrap_err();

    assert!(matches!(err, QueryError::NotFound { entity: "Estate", .. }));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn estate_lists_its_assigned_operator() {
    let h = Harness::new();
    let estate_id = AggregateId::new();
    let operator_id = AggregateId::new();

    let events = [
        EstateEvent::estate_created(estate_id, "Demo Estate"),
        EstateEvent::operator_assigned(estate_id, operator_id, "Safaricom"),
    ];
    let envelopes = events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            EventEnvelope::builder()
                .aggregate_id(estate_id)
                .aggregate_type("Estate")
                .event_type(event.event_type())
                .version(Version::new(i as i64 + 1))
                .payload(event)
                .unwrap()
                .build()
        })
        .collect();
    h.store
        .append(envelopes, AppendOptions::new())
        .await
        .unwrap();

    let estate = h.manager.get_estate(estate_id).await.unwrap();

    assert_eq!(estate.name, "Demo Estate");
    assert_eq!(estate.operators.len(), 1);
    assert_eq!(estate.operators[0].operator_id, operator_id);
    assert_eq!(estate.operators[0].name, "Safaricom");
    assert!(!estate.operators[0].is_deleted);
}

#[tokio::test]
async fn estate_operator_details_come_from_the_operator_stream() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let operator_id = AggregateId::new();

    let operators: CommandHandler<_, Operator> = CommandHandler::new(h.store.clone());
    operators
        .execute(operator_id, |o| {
            o.create(operator_id, estate_id, "Voucher Co", true, false)
        })
        .await
        .unwrap();
    let estates: CommandHandler<_, Estate> = CommandHandler::new(h.store.clone());
    estates
        .execute(estate_id, |e| e.assign_operator(operator_id, "Voucher Co"))
        .await
        .unwrap();

    let estate = h.manager.get_estate(estate_id).await.unwrap();
    assert!(estate.operators[0].require_custom_merchant_number);
    assert!(!estate.operators[0].require_custom_terminal_number);

    let operator = h.manager.get_operator(estate_id, operator_id).await.unwrap();
    assert_eq!(operator.name, "Voucher Co");
    assert!(
        h.manager
            .get_operator(AggregateId::new(), operator_id)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn uncreated_contract_is_not_found() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;

    let err = h
        .manager
        .get_contract(estate_id, AggregateId::new())
        .await
        .unwrap_err();

    assert!(matches!(err, QueryError::NotFound { entity: "Contract", .. }));
}

#[tokio::test]
async fn contract_is_scoped_to_its_estate() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let contract_id = AggregateId::new();
    let product_id = ProductId::new();

    let contracts: CommandHandler<_, Contract> = CommandHandler::new(h.store.clone());
    contracts
        .execute(contract_id, |c| {
            c.create(contract_id, estate_id, AggregateId::new(), "Airtime")
        })
        .await
        .unwrap();

    let empty = h.manager.get_contract(estate_id, contract_id).await.unwrap();
    assert!(empty.products.is_empty());

    contracts
        .execute(contract_id, |c| {
            c.add_product(product_id, "100 KES", "100 KES Topup", Some(dec!(100)))
        })
        .await
        .unwrap();
    let contract = h.manager.get_contract(estate_id, contract_id).await.unwrap();
    assert_eq!(contract.products.len(), 1);
    assert_eq!(contract.products[0].value, Some(dec!(100)));

    let err = h
        .manager
        .get_contract(AggregateId::new(), contract_id)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound { .. }));
}

#[tokio::test]
async fn unavailable_store_is_a_failure_not_not_found() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    h.store.set_unavailable(true);

    let err = h.manager.get_estate(estate_id).await.unwrap_err();

    assert!(matches!(err, QueryError::Failure(_)));
    assert_eq!(err.status_code(), 503);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn empty_lists_are_none_found() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    h.catch_up().await;

    for err in [
        h.manager.get_merchants(estate_id).await.unwrap_err(),
        h.manager.get_operators(estate_id).await.map(|_| ()).unwrap_err(),
        h.manager.get_contracts(estate_id).await.map(|_| ()).unwrap_err(),
    ]
    .iter()
    {
        assert!(matches!(err, QueryError::NoneFound { .. }));
        assert_eq!(err.status_code(), 404);
    }
}

#[tokio::test]
async fn merchant_lists_come_from_the_read_model() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let first = h.merchant(estate_id, "Corner Shop").await;
    h.merchant(estate_id, "Kiosk").await;
    h.catch_up().await;

    let merchants = h.manager.get_merchants(estate_id).await.unwrap();
    assert_eq!(merchants.len(), 2);

    let late = h.merchant(estate_id, "Late Store").await;
    assert_eq!(h.manager.get_merchants(estate_id).await.unwrap().len(), 2);
    assert_eq!(
        h.manager.get_merchant(estate_id, late).await.unwrap().merchant.name,
        "Late Store"
    );

    let estates = h.manager.get_estates().await.unwrap();
    assert_eq!(estates.len(), 1);
    assert!(merchants.iter().any(|m| m.merchant_id == first));
}

#[tokio::test]
async fn merchant_carries_its_projected_balance() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let merchant_id = h.merchant(estate_id, "Corner Shop").await;

    let merchants: CommandHandler<_, Merchant> = CommandHandler::new(h.store.clone());
    merchants
        .execute(merchant_id, |m| {
            m.make_deposit(
                DepositSource::Manual,
                "DEP-1",
                Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
                dec!(250.00),
            )
        })
        .await
        .unwrap();

    let before = h.manager.get_merchant(estate_id, merchant_id).await.unwrap();
    assert_eq!(before.balance, dec!(0));
    assert!(
        h.manager
            .get_merchant_balance(estate_id, merchant_id)
            .await
            .is_err()
    );

    h.catch_up().await;
    let after = h.manager.get_merchant(estate_id, merchant_id).await.unwrap();
    assert_eq!(after.balance, dec!(250.00));

    let history = h
        .manager
        .get_merchant_balance_history(
            estate_id,
            merchant_id,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, dec!(250.00));

    let err = h
        .manager
        .get_merchant(AggregateId::new(), merchant_id)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound { entity: "Merchant", .. }));
}

#[tokio::test]
async fn voucher_is_found_by_code_within_its_estate() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let voucher_id = AggregateId::new();
    let now = Utc::now();

    let vouchers: CommandHandler<_, Voucher> = CommandHandler::new(h.store.clone());
    vouchers
        .execute(voucher_id, |v| {
            v.generate(VoucherGeneratedData {
                voucher_id,
                estate_id,
                transaction_id: AggregateId::new(),
                voucher_code: "ABC123".to_string(),
                value: dec!(20.00),
                expiry_date: now + Duration::days(30),
                generated_at: now,
            })
        })
        .await
        .unwrap();
    h.catch_up().await;

    let voucher = h
        .manager
        .get_voucher_by_code(estate_id, "ABC123")
        .await
        .unwrap();
    assert_eq!(voucher.voucher_id, voucher_id);
    assert_eq!(voucher.balance, dec!(20.00));

    let other_estate = h
        .manager
        .get_voucher_by_code(AggregateId::new(), "ABC123")
        .await
        .unwrap_err();
    assert!(matches!(other_estate, QueryError::NotFound { entity: "Voucher", .. }));
}

#[tokio::test]
async fn unknown_settlement_is_not_found_and_empty_ranges_are_fine() {
    let h = Harness::new();
    let estate_id = h.estate("Demo Estate").await;
    let merchant_id = h.merchant(estate_id, "Corner Shop").await;
    h.catch_up().await;

    let err = h
        .manager
        .get_settlement(estate_id, AggregateId::new())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::NotFound { entity: "Settlement", .. }));

    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    assert!(
        h.manager
            .get_settlements(estate_id, Some(merchant_id), day, day)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(
        h.manager
            .get_transactions(estate_id, merchant_id, day, day)
            .await
            .unwrap()
            .is_empty()
    );
}
