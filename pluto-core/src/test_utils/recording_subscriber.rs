//! RecordingSubscriber: records every delivered event.

use crate::error::SubscriberError;
use crate::event::{Event, Subscriber};
use async_trait::async_trait;
use std::sync::Mutex;

/// A subscriber that records every event it receives.
/// Use `.events()` to inspect what was recorded.
pub struct RecordingSubscriber {
    events: Mutex<Vec<Event>>,
    fail_with: Option<String>,
}

impl RecordingSubscriber {
    /// Create a subscriber that accepts every event.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_with: None,
        }
    }

    /// Create a subscriber that records every event and then fails with
    /// `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    /// Return a snapshot of all recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The topics of all recorded events, in delivery order.
    pub fn topics(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.topic.to_string())
            .collect()
    }
}

impl Default for RecordingSubscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Subscriber for RecordingSubscriber {
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.events.lock().unwrap().push(event.clone());
        match &self.fail_with {
            Some(message) => Err(SubscriberError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}
