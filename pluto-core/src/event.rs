//! The Messaging protocol: anonymous events between components.
//!
//! Producers publish [`Event`]s without knowing who listens. Consumers
//! register a [`Subscriber`] with a [`TopicFilter`]. Events are ephemeral:
//! nothing is stored once delivery to the current subscribers is done.

use crate::error::{PublishError, SubscriberError};
use crate::id::{ComponentName, Topic};
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Well-known topics published by the framework itself.
pub mod topics {
    /// Published by the registry after a variable was set. Payload:
    /// `{"component": .., "variable": .., "value": ..}`.
    pub const VARIABLE_UPDATE: &str = "variable.update";

    /// Requests the hosting application to shut down.
    pub const STOP: &str = "stop";
}

/// A message on the bus.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Topic tag used for subscription matching.
    pub topic: Topic,
    /// Free-form payload.
    pub payload: Value,
    /// Component that published the event, when known.
    pub source: Option<ComponentName>,
}

impl Event {
    /// Create an event with no source.
    pub fn new(topic: impl Into<Topic>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            source: None,
        }
    }

    /// Attach the publishing component.
    pub fn with_source(mut self, source: impl Into<ComponentName>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The event the registry publishes after a successful variable set.
    pub fn variable_update(component: &str, variable: &str, value: Value) -> Self {
        Self::new(
            topics::VARIABLE_UPDATE,
            serde_json::json!({
                "component": component,
                "variable": variable,
                "value": value,
            }),
        )
        .with_source(component)
    }

    /// A request to stop the hosting application.
    pub fn stop() -> Self {
        Self::new(topics::STOP, Value::Null)
    }
}

/// Which topics a subscription receives.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "topic", rename_all = "snake_case")]
pub enum TopicFilter {
    /// Every event.
    All,
    /// Only events with exactly this topic.
    Exact(Topic),
}

impl TopicFilter {
    /// Filter for one topic.
    pub fn topic(topic: impl Into<Topic>) -> Self {
        Self::Exact(topic.into())
    }

    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::All => true,
            Self::Exact(topic) => *topic == event.topic,
        }
    }
}

/// Predicate used by scheduler waits: topic equality plus an optional
/// payload pattern.
///
/// A pattern object matches any payload object containing at least the
/// pattern's keys with matching values (applied recursively). Every other
/// pattern must equal the payload exactly.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMatch {
    /// Required topic.
    pub topic: Topic,
    /// Optional payload pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl EventMatch {
    /// Match any event on `topic`.
    pub fn topic(topic: impl Into<Topic>) -> Self {
        Self {
            topic: topic.into(),
            payload: None,
        }
    }

    /// Additionally require the payload to contain `pattern`.
    pub fn with_payload(mut self, pattern: Value) -> Self {
        self.payload = Some(pattern);
        self
    }

    /// Whether `event` satisfies this predicate.
    pub fn matches(&self, event: &Event) -> bool {
        self.topic == event.topic
            && self
                .payload
                .as_ref()
                .is_none_or(|pattern| contains(&event.payload, pattern))
    }
}

fn contains(actual: &Value, pattern: &Value) -> bool {
    match (actual, pattern) {
        (Value::Object(actual), Value::Object(pattern)) => pattern
            .iter()
            .all(|(key, want)| actual.get(key).is_some_and(|got| contains(got, want))),
        _ => actual == pattern,
    }
}

/// Receives events delivered by a bus.
///
/// Delivery is synchronous from the publisher's point of view: `publish`
/// awaits each subscriber in turn. Keep handlers short.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Handle one delivered event. An error is reported back to the
    /// publisher but never stops delivery to other subscribers.
    ///
    /// Implementations must not panic: delivery runs inline in
    /// `publish`, so a panic unwinds into the publisher and the remaining
    /// subscribers never see the event. Report failures as `Err`.
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError>;
}

/// Anything events can be published into.
///
/// The registry uses this seam to announce variable updates without
/// depending on a concrete bus.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver `event` to every current subscriber whose filter matches.
    async fn publish(&self, event: Event) -> Result<(), PublishError>;
}
