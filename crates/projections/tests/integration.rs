//! Integration tests: aggregate commands → global feed → read model views.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use common::AggregateId;
use domain::merchant::DepositSource;
use domain::transaction::{AddProductDetails, CompleteTransaction, StartTransaction};
use domain::{
    CalculationType, CommandHandler, Contract, Estate, FeeId, FeeType, Merchant, ProductId,
    SettlementStatus, TransactionService,
};
use event_store::InMemoryEventStore;
use projections::{
    BalanceChangeType, CatalogView, MerchantBalanceView, Projection, ProjectionProcessor,
    ProjectionWorkers, SettlementView, TransactionView, WorkerConfig, deliver_batch,
};
use rust_decimal_macros::dec;
use settlement::SettlementEngine;
use tokio_util::sync::CancellationToken;

struct Views {
    catalog: CatalogView,
    transactions: TransactionView,
    settlements: SettlementView,
    balances: MerchantBalanceView,
}

impl Views {
    fn new() -> Self {
        Self {
            catalog: CatalogView::default(),
            transactions: TransactionView::default(),
            settlements: SettlementView::default(),
            balances: MerchantBalanceView::default(),
        }
    }

    fn processor(&self, store: InMemoryEventStore) -> ProjectionProcessor<InMemoryEventStore> {
        let mut processor = ProjectionProcessor::new(store).with_batch_size(8);
        processor.register(Box::new(self.catalog.clone()));
        processor.register(Box::new(self.transactions.clone()));
        processor.register(Box::new(self.settlements.clone()));
        processor.register(Box::new(self.balances.clone()));
        processor
    }
}

struct Seeded {
    store: InMemoryEventStore,
    estate_id: AggregateId,
    merchant_id: AggregateId,
    contract_id: AggregateId,
    product_id: ProductId,
}

fn sale_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

async fn seed() -> Seeded {
    let store = InMemoryEventStore::new();
    let estate_id = AggregateId::new();
    let merchant_id = AggregateId::new();
    let contract_id = AggregateId::new();
    let operator_id = AggregateId::new();
    let product_id = ProductId::new();

    let estates: CommandHandler<_, Estate> = CommandHandler::new(store.clone());
    estates
        .execute(estate_id, |e| e.create(estate_id, "Demo Estate"))
        .await
        .unwrap();
    estates
        .execute(estate_id, |e| e.assign_operator(operator_id, "Safaricom"))
        .await
        .unwrap();

    let merchants: CommandHandler<_, Merchant> = CommandHandler::new(store.clone());
    merchants
        .execute(merchant_id, |m| m.create(merchant_id, estate_id, "Corner Shop"))
        .await
        .unwrap();
    merchants
        .execute(merchant_id, |m| {
            m.make_deposit(
                DepositSource::Manual,
                "DEP-1",
                Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap(),
                dec!(500.00),
            )
        })
        .await
        .unwrap();

    let contracts: CommandHandler<_, Contract> = CommandHandler::new(store.clone());
    contracts
        .execute(contract_id, |c| {
            c.create(contract_id, estate_id, operator_id, "Airtime")
        })
        .await
        .unwrap();
    contracts
        .execute(contract_id, |c| {
            c.add_product(product_id, "Custom", "Custom Amount", None)
        })
        .await
        .unwrap();
    contracts
        .execute(contract_id, |c| {
            c.add_transaction_fee(
                product_id,
                FeeId::new(),
                "Merchant Commission",
                CalculationType::Percentage,
                FeeType::Merchant,
                dec!(0.5),
            )
        })
        .await
        .unwrap();

    Seeded {
        store,
        estate_id,
        merchant_id,
        contract_id,
        product_id,
    }
}

async fn sell(e: &Seeded, hour: u32) -> AggregateId {
    let service = TransactionService::new(e.store.clone());
    let at = Utc.with_ymd_and_hms(2024, 3, 15, hour, 0, 0).unwrap();
    let start = StartTransaction::sale(e.estate_id, e.merchant_id, at, dec!(100.00));
    let transaction_id = start.transaction_id;

    service.start_transaction(start).await.unwrap();
    service
        .add_product_details(AddProductDetails::new(
            transaction_id,
            e.contract_id,
            e.product_id,
        ))
        .await
        .unwrap();
    service
        .complete_transaction(CompleteTransaction::authorised(transaction_id))
        .await
        .unwrap();
    transaction_id
}

async fn settle(e: &Seeded) -> AggregateId {
    let engine = SettlementEngine::new(e.store.clone());
    let run = engine
        .process_settlement(
            e.estate_id,
            e.merchant_id,
            sale_day(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    run.report.settlement_id
}

#[tokio::test]
async fn settlement_flow_reaches_every_view() {
    let e = seed().await;
    let first = sell(&e, 10).await;
    sell(&e, 11).await;
    let settlement_id = settle(&e).await;

    let views = Views::new();
    views.processor(e.store.clone()).run_catch_up().await.unwrap();

    let estate = views.catalog.estate(e.estate_id).await.unwrap();
    assert_eq!(estate.name, "Demo Estate");
    assert_eq!(estate.operators.len(), 1);
    assert_eq!(views.catalog.contracts(e.estate_id).await.len(), 1);

    let sale = views.transactions.transaction(first).await.unwrap();
    assert!(sale.is_completed && sale.is_authorised);
    assert_eq!(sale.contract_id, Some(e.contract_id));

    let summary = views.settlements.settlement(settlement_id).await.unwrap();
    assert_eq!(summary.status, SettlementStatus::Completed);
    assert_eq!(summary.fee_count, 2);
    assert_eq!(summary.settled_fee_count, 2);
    assert_eq!(summary.total_fee_value, dec!(1.00));
    assert_eq!(views.settlements.fees(settlement_id).await.len(), 2);

    let balance = views
        .balances
        .balance(e.estate_id, e.merchant_id)
        .await
        .unwrap();
    assert_eq!(balance.total_deposited, dec!(500.00));
    assert_eq!(balance.authorised_sale_count, 2);
    assert_eq!(balance.settled_fees_value, dec!(1.00));
    assert_eq!(balance.balance, dec!(301.00));
    assert_eq!(balance.pending_sales_value, dec!(0));
}

#[tokio::test]
async fn balance_history_is_ordered_and_filtered_by_date() {
    let e = seed().await;
    sell(&e, 10).await;
    settle(&e).await;

    let views = Views::new();
    views.processor(e.store.clone()).run_catch_up().await.unwrap();

    let history = views
        .balances
        .history(
            e.estate_id,
            e.merchant_id,
            NaiveDate::MIN,
            NaiveDate::MAX,
        )
        .await;
    let kinds: Vec<_> = history.iter().map(|h| h.change_type).collect();
    assert_eq!(kinds[0], BalanceChangeType::Deposit);
    assert_eq!(kinds[1], BalanceChangeType::Sale);
    assert_eq!(history.len(), 3);

    let deposit_day = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();
    let only_deposit_day = views
        .balances
        .history(e.estate_id, e.merchant_id, deposit_day, deposit_day)
        .await;
    assert_eq!(only_deposit_day.len(), 1);
}

#[tokio::test]
async fn redelivered_feed_adds_no_rows() {
    let e = seed().await;
    sell(&e, 10).await;
    sell(&e, 12).await;
    let settlement_id = settle(&e).await;

    let views = Views::new();
    views.processor(e.store.clone()).run_catch_up().await.unwrap();
    let fees_before = views.settlements.fee_row_count().await;
    let changes_before = views.balances.change_count().await;
    let balance_before = views.balances.balance(e.estate_id, e.merchant_id).await;

    for projection in [
        &views.settlements as &dyn Projection,
        &views.balances as &dyn Projection,
    ] {
        let mut cursor = 0;
        loop {
            let outcome = deliver_batch(&e.store, projection, &mut cursor, 16)
                .await
                .unwrap();
            assert_eq!(outcome.applied, 0);
            if outcome.read < 16 {
                break;
            }
        }
    }

    assert_eq!(views.settlements.fee_row_count().await, fees_before);
    assert_eq!(views.settlements.fees(settlement_id).await.len(), 2);
    assert_eq!(views.balances.change_count().await, changes_before);
    assert_eq!(
        views.balances.balance(e.estate_id, e.merchant_id).await,
        balance_before
    );
}

#[tokio::test]
async fn rebuild_matches_incremental_catch_up() {
    let e = seed().await;
    sell(&e, 9).await;

    let views = Views::new();
    let processor = views.processor(e.store.clone());
    processor.run_catch_up().await.unwrap();
    sell(&e, 14).await;
    settle(&e).await;
    processor.run_catch_up().await.unwrap();
    let incremental = views.balances.balance(e.estate_id, e.merchant_id).await;

    processor.rebuild_all().await.unwrap();
    let rebuilt = views.balances.balance(e.estate_id, e.merchant_id).await;

    assert_eq!(rebuilt.map(|b| b.balance), incremental.map(|b| b.balance));
}

#[tokio::test]
async fn workers_follow_the_feed_until_cancelled() {
    let e = seed().await;
    let views = Views::new();

    let mut workers = ProjectionWorkers::new(
        e.store.clone(),
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            batch_size: 4,
        },
    );
    workers.register(Arc::new(views.transactions.clone()));
    workers.register(Arc::new(views.balances.clone()));
    let cancel = CancellationToken::new();
    let handles = workers.spawn(cancel.clone());
    assert_eq!(handles.len(), 2);

    let transaction_id = sell(&e, 10).await;

    let caught_up = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let sold = views
                .transactions
                .transaction(transaction_id)
                .await
                .is_some_and(|t| t.is_completed);
            let balanced = views
                .balances
                .balance(e.estate_id, e.merchant_id)
                .await
                .is_some_and(|b| b.authorised_sale_count == 1);
            if sold && balanced {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(caught_up.is_ok(), "workers did not reach the head of the feed");

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handles.join())
        .await
        .expect("workers did not stop after cancellation");
}

#[tokio::test]
async fn workers_survive_an_unavailable_store() {
    let e = seed().await;
    let views = Views::new();
    e.store.set_unavailable(true);

    let mut workers = ProjectionWorkers::new(
        e.store.clone(),
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            batch_size: 4,
        },
    );
    workers.register(Arc::new(views.catalog.clone()));
    let cancel = CancellationToken::new();
    let handles = workers.spawn(cancel.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(views.catalog.estate(e.estate_id).await.is_none());
    e.store.set_unavailable(false);

    let caught_up = tokio::time::timeout(Duration::from_secs(5), async {
        while views.catalog.estate(e.estate_id).await.is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(caught_up.is_ok());

    cancel.cancel();
    handles.join().await;
}
