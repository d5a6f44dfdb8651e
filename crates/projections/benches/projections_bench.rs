use chrono::{TimeZone, Utc};
use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::merchant::DepositMadeData;
use domain::{DomainEvent, MerchantEvent};
use event_store::{AppendOptions, EventEnvelope, InMemoryEventStore, Version, store::EventStore};
use projections::{MerchantBalanceView, Projection, ProjectionProcessor};
use rust_decimal::Decimal;

fn make_envelope(aggregate_id: AggregateId, version: i64, event: &MerchantEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Merchant")
        .event_type(DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
}

/// Populates a store with `merchants` merchants, each with `deposits` deposits.
async fn populate_store(store: &InMemoryEventStore, merchants: usize, deposits: usize) {
    let estate_id = AggregateId::new();
    for _ in 0..merchants {
        let merchant_id = AggregateId::new();
        let events = (0..deposits)
            .map(|i| {
                let event = MerchantEvent::ManualDepositMade(DepositMadeData {
                    merchant_id,
                    estate_id,
                    deposit_id: uuid::Uuid::new_v4(),
                    reference: format!("DEP-{i}"),
                    deposit_date_time: Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
                    amount: Decimal::from(10 + i as i64),
                });
                make_envelope(merchant_id, i as i64 + 1, &event)
            })
            .collect();
        store.append(events, AppendOptions::new()).await.unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion, merchants: usize) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, merchants, 3));

    c.bench_function(
        &format!("projections/balance_catch_up_{}_events", merchants * 3),
        |b| {
            b.iter(|| {
                rt.block_on(async {
                    let view = MerchantBalanceView::default();
                    let mut processor = ProjectionProcessor::new(store.clone());
                    processor.register(Box::new(view.clone()) as Box<dyn Projection>);
                    processor.run_catch_up().await.unwrap();
                });
            });
        },
    );
}

fn bench_catch_up_100_merchants(c: &mut Criterion) {
    bench_catch_up(c, 100);
}

fn bench_catch_up_1000_merchants(c: &mut Criterion) {
    bench_catch_up(c, 1000);
}

fn bench_redelivery(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(populate_store(&store, 100, 3));

    let view = MerchantBalanceView::default();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Box::new(view.clone()) as Box<dyn Projection>);
    rt.block_on(processor.run_catch_up()).unwrap();

    c.bench_function("projections/balance_redelivery_300_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut cursor = 0;
                projections::deliver_batch(&store, &view, &mut cursor, 300)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_catch_up_100_merchants,
    bench_catch_up_1000_merchants,
    bench_redelivery
);
criterion_main!(benches);
