//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::{EventEnvelope, RecordedEvent};

use crate::Result;

/// Where a projection is in the global event feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Feed position of the last event this projection has seen.
    pub checkpoint: u64,
    /// Events that changed the read model.
    pub events_applied: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Moves the checkpoint forward. Redelivered events never move it back.
    pub fn advance(&self, position: u64, applied: bool) -> Self {
        Self {
            checkpoint: self.checkpoint.max(position),
            events_applied: self.events_applied + u64::from(applied),
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position({}, applied {})",
            self.checkpoint, self.events_applied
        )
    }
}

/// What handling one event did to a read model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The read model changed.
    Applied,
    /// The event was already in the processed-events ledger.
    Duplicate,
    /// The event belongs to another family or carries an unknown type.
    Ignored,
}

/// A projection that folds events into a denormalized read model.
///
/// Delivery is at-least-once: `handle` may see the same event more than
/// once and must leave the read model as if it had seen it once.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Aggregate types whose events this projection consumes.
    fn aggregate_types(&self) -> &'static [&'static str];

    fn interested_in(&self, event: &EventEnvelope) -> bool {
        self.aggregate_types()
            .contains(&event.aggregate_type.as_str())
    }

    /// Handles a single event from the global feed. Each event is applied
    /// entirely or not at all.
    async fn handle(&self, record: &RecordedEvent) -> Result<Applied>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model, its ledger and its position.
    async fn reset(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_starts_at_zero() {
        let pos = ProjectionPosition::zero();
        assert_eq!(pos.checkpoint, 0);
        assert_eq!(pos.events_applied, 0);
    }

    #[test]
    fn position_advances() {
        let pos = ProjectionPosition::zero().advance(1, true).advance(2, false);
        assert_eq!(pos.checkpoint, 2);
        assert_eq!(pos.events_applied, 1);
    }

    #[test]
    fn redelivery_does_not_rewind() {
        let pos = ProjectionPosition::zero().advance(5, true).advance(3, false);
        assert_eq!(pos.checkpoint, 5);
    }

    #[test]
    fn position_display() {
        let pos = ProjectionPosition {
            checkpoint: 42,
            events_applied: 7,
        };
        assert_eq!(pos.to_string(), "position(42, applied 7)");
    }
}
