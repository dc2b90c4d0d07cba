//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations that prove the trait APIs are usable.

mod fake_component;
mod recording_subscriber;

pub use fake_component::{CallLog, FakeComponent};
pub use recording_subscriber::RecordingSubscriber;
