//! Read-model tables and the per-view write path.
//!
//! Every view keeps its tables, its processed-events ledger and its position
//! behind a single lock. An event is applied while that lock is held, so a
//! reader sees the state before the event or after it, never halfway.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::ops::RangeBounds;

use chrono::{DateTime, Utc};
use event_store::{EventEnvelope, EventId, RecordedEvent};
use tokio::sync::RwLock;

use crate::projection::{Applied, ProjectionPosition};
use crate::{ProjectionError, Result};

pub const MERCHANT_SETTLEMENT_FEES: &str = "merchant_settlement_fees";
pub const MERCHANT_BALANCE_CHANGES: &str = "merchant_balance_changes";
pub const PROCESSED_EVENTS: &str = "processed_events";

/// Which tables treat a duplicate-key insert as a no-op.
///
/// Tables not listed reject a duplicate key with
/// [`ProjectionError::DuplicateKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    ignore_duplicate_tables: BTreeSet<String>,
}

impl WriterConfig {
    pub fn new<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            ignore_duplicate_tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// Every table rejects duplicate keys.
    pub fn strict() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Parses a comma-separated table list. Blank entries are skipped.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty()),
        )
    }

    pub fn ignores_duplicates(&self, table: &str) -> bool {
        self.ignore_duplicate_tables.contains(table)
    }
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self::new([
            MERCHANT_SETTLEMENT_FEES,
            MERCHANT_BALANCE_CHANGES,
            PROCESSED_EVENTS,
        ])
    }
}

/// A keyed table of read-model rows.
#[derive(Debug, Clone)]
pub struct Table<K, V> {
    name: &'static str,
    rows: BTreeMap<K, V>,
}

impl<K: Ord + Debug, V> Table<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Inserts a row if the key is absent. Returns false when the key was
    /// present and this table ignores duplicates.
    pub fn insert(&mut self, key: K, value: V, config: &WriterConfig) -> Result<bool> {
        if self.rows.contains_key(&key) {
            if config.ignores_duplicates(self.name) {
                return Ok(false);
            }
            return Err(ProjectionError::DuplicateKey {
                table: self.name,
                key: format!("{key:?}"),
            });
        }
        self.rows.insert(key, value);
        Ok(true)
    }

    pub fn upsert(&mut self, key: K, value: V) -> Option<V> {
        self.rows.insert(key, value)
    }

    pub fn get_or_insert_with(&mut self, key: K, f: impl FnOnce() -> V) -> &mut V {
        self.rows.entry(key).or_insert_with(f)
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.rows.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.rows.remove(key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.rows.values()
    }

    pub fn filter(&self, predicate: impl Fn(&V) -> bool) -> Vec<V>
    where
        V: Clone,
    {
        self.rows.values().filter(|v| predicate(v)).cloned().collect()
    }

    pub fn range<R: RangeBounds<K>>(&self, range: R) -> impl Iterator<Item = (&K, &V)> {
        self.rows.range(range)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// The processed-events ledger, keyed by (event id, event type).
#[derive(Debug, Clone)]
pub struct EventLedger {
    table: Table<(EventId, String), DateTime<Utc>>,
}

impl EventLedger {
    pub fn new() -> Self {
        Self {
            table: Table::new(PROCESSED_EVENTS),
        }
    }

    pub fn contains(&self, event: &EventEnvelope) -> bool {
        self.table.contains(&event.ledger_key())
    }

    pub fn record(&mut self, event: &EventEnvelope, config: &WriterConfig) -> Result<bool> {
        self.table.insert(event.ledger_key(), Utc::now(), config)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// A view's tables with the ledger and position that guard them.
#[derive(Debug, Default)]
pub(crate) struct ViewState<M> {
    pub model: M,
    pub ledger: EventLedger,
    pub position: ProjectionPosition,
}

impl<M: Default> ViewState<M> {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Applies `record` to a view at most once.
///
/// `apply` returns Ok(false) for events the view has no use for. It must do
/// its fallible work (decoding, keyed inserts) before any other mutation, so
/// an error leaves the model untouched.
pub(crate) async fn apply_once<M, F>(
    state: &RwLock<ViewState<M>>,
    projection: &'static str,
    record: &RecordedEvent,
    config: &WriterConfig,
    apply: F,
) -> Result<Applied>
where
    F: FnOnce(&mut M, &EventEnvelope) -> Result<bool>,
{
    let event = &record.envelope;
    let mut state = state.write().await;

    let applied = if state.ledger.contains(event) {
        metrics::counter!("projections_events_skipped_duplicate", "projection" => projection)
            .increment(1);
        tracing::debug!(
            projection,
            event_id = %event.event_id,
            event_type = %event.event_type,
            "event already applied"
        );
        Applied::Duplicate
    } else if apply(&mut state.model, event)? {
        state.ledger.record(event, config)?;
        metrics::counter!("projections_events_processed", "projection" => projection)
            .increment(1);
        Applied::Applied
    } else {
        Applied::Ignored
    };

    state.position = state
        .position
        .advance(record.position, applied == Applied::Applied);
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_ignores_the_ledger_tables() {
        let config = WriterConfig::default();
        assert!(config.ignores_duplicates(MERCHANT_SETTLEMENT_FEES));
        assert!(config.ignores_duplicates(MERCHANT_BALANCE_CHANGES));
        assert!(config.ignores_duplicates(PROCESSED_EVENTS));
        assert!(!config.ignores_duplicates("settlement_summaries"));
    }

    #[test]
    fn parse_trims_and_skips_blanks() {
        let config = WriterConfig::parse(" merchant_settlement_fees, ,processed_events ");
        assert!(config.ignores_duplicates(MERCHANT_SETTLEMENT_FEES));
        assert!(config.ignores_duplicates(PROCESSED_EVENTS));
        assert!(!config.ignores_duplicates(MERCHANT_BALANCE_CHANGES));
        assert!(!config.ignores_duplicates(""));
    }

    #[test]
    fn duplicate_insert_is_ignored_when_configured() {
        let mut table: Table<u32, &str> = Table::new(MERCHANT_SETTLEMENT_FEES);
        let config = WriterConfig::default();

        assert!(table.insert(1, "first", &config).unwrap());
        assert!(!table.insert(1, "second", &config).unwrap());
        assert_eq!(table.get(&1), Some(&"first"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_insert_is_rejected_otherwise() {
        let mut table: Table<u32, &str> = Table::new(MERCHANT_SETTLEMENT_FEES);
        let config = WriterConfig::strict();

        table.insert(1, "first", &config).unwrap();
        let result = table.insert(1, "second", &config);
        assert!(matches!(
            result,
            Err(ProjectionError::DuplicateKey { table: MERCHANT_SETTLEMENT_FEES, .. })
        ));
        assert_eq!(table.get(&1), Some(&"first"));
    }

    #[test]
    fn upsert_replaces() {
        let mut table: Table<u32, u32> = Table::new("counters");
        assert_eq!(table.upsert(1, 10), None);
        assert_eq!(table.upsert(1, 20), Some(10));
        assert_eq!(table.filter(|v| *v > 15), vec![20]);
    }

    #[test]
    fn range_is_ordered() {
        let mut table: Table<(u32, u32), ()> = Table::new("pairs");
        let config = WriterConfig::strict();
        for key in [(2, 1), (1, 2), (1, 1), (3, 0)] {
            table.insert(key, (), &config).unwrap();
        }

        let keys: Vec<_> = table.range((1, 0)..(2, 0)).map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![(1, 1), (1, 2)]);
    }
}
