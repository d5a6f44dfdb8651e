//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events are immutable facts, named in the past tense. Each event
/// enum carries a `type` tag in its JSON form and lists every tag it
/// understands in [`DomainEvent::EVENT_TYPES`], so a stream reader can skip
/// kinds that belong to somebody else instead of failing on them.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Every event type tag this enum can decode.
    const EVENT_TYPES: &'static [&'static str];

    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns true if `event_type` is one of this enum's tags.
    fn is_known(event_type: &str) -> bool {
        Self::EVENT_TYPES.contains(&event_type)
    }
}

/// Events that identify the estate they belong to.
pub trait HasEstateId {
    fn estate_id(&self) -> Option<AggregateId>;
}

/// Events that identify the merchant they belong to.
pub trait HasMerchantId {
    fn merchant_id(&self) -> Option<AggregateId>;
}

/// Explicit creation state of an aggregate.
///
/// An aggregate whose stream holds no creation event is `Uncreated`; callers
/// match on this instead of probing individual fields for defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Lifecycle<T> {
    #[default]
    Uncreated,
    Created(T),
}

impl<T> Lifecycle<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Lifecycle::Created(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Lifecycle::Created(details) => Some(details),
            Lifecycle::Uncreated => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Lifecycle::Created(details) => Some(details),
            Lifecycle::Uncreated => None,
        }
    }
}

/// Trait for event-sourced aggregates.
///
/// State is rebuilt by folding the aggregate's own stream into a default
/// instance. Commands are methods that inspect state and return events;
/// only `apply` changes state.
pub trait Aggregate: Default + Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// The type of errors its commands can produce.
    type Error: std::error::Error + Send + Sync;

    /// Returns the aggregate type name stored on every envelope.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's identifier, or None while uncreated.
    fn id(&self) -> Option<AggregateId>;

    /// Returns true once the creation event has been folded.
    fn is_created(&self) -> bool {
        self.id().is_some()
    }

    /// Returns the stream version the state was folded up to.
    fn version(&self) -> Version;

    /// Sets the stream version. Called by the loader after each envelope.
    fn set_version(&mut self, version: Version);

    /// Folds one event into the state.
    ///
    /// Must be pure, deterministic and total: events that make no sense in
    /// the current state are ignored.
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "type", content = "data")]
    enum TestEvent {
        Created { id: AggregateId },
        Renamed { name: String },
    }

    impl DomainEvent for TestEvent {
        const EVENT_TYPES: &'static [&'static str] = &["TestCreated", "TestRenamed"];

        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Renamed { .. } => "TestRenamed",
            }
        }
    }

    #[derive(Debug, Default)]
    struct TestAggregate {
        state: Lifecycle<(AggregateId, String)>,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test error")]
    struct TestError;

    impl Aggregate for TestAggregate {
        type Event = TestEvent;
        type Error = TestError;

        fn aggregate_type() -> &'static str {
            "Test"
        }

        fn id(&self) -> Option<AggregateId> {
            self.state.get().map(|(id, _)| *id)
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { id } => {
                    self.state = Lifecycle::Created((id, String::new()));
                }
                TestEvent::Renamed { name } => {
                    if let Some(details) = self.state.get_mut() {
                        details.1 = name;
                    }
                }
            }
        }
    }

    #[test]
    fn event_before_creation_is_ignored() {
        let mut aggregate = TestAggregate::default();
        aggregate.apply(TestEvent::Renamed {
            name: "early".to_string(),
        });
        assert!(!aggregate.is_created());
    }

    #[test]
    fn apply_events_folds_in_order() {
        let id = AggregateId::new();
        let mut aggregate = TestAggregate::default();
        aggregate.apply_events(vec![
            TestEvent::Created { id },
            TestEvent::Renamed {
                name: "first".to_string(),
            },
            TestEvent::Renamed {
                name: "second".to_string(),
            },
        ]);

        assert_eq!(aggregate.id(), Some(id));
        assert_eq!(aggregate.state.get().unwrap().1, "second");
    }

    #[test]
    fn known_event_types() {
        assert!(TestEvent::is_known("TestRenamed"));
        assert!(!TestEvent::is_known("SomethingElse"));
    }

    #[test]
    fn lifecycle_defaults_to_uncreated() {
        let lifecycle: Lifecycle<u8> = Lifecycle::default();
        assert!(!lifecycle.is_created());
        assert!(lifecycle.get().is_none());
    }
}
