//! # pluto-core: Protocol traits for Pluto experimental schedules
//!
//! This crate defines the seams that the rest of the Pluto workspace is
//! built around. Implementations live in their own crates; everything here
//! is vocabulary.
//!
//! ## The Protocols
//!
//! | Protocol | Trait | What it does |
//! |----------|-------|-------------|
//! | ① Component | [`Component`] | A named unit exposing methods and variables |
//! | ② Dispatch | [`Dispatcher`] | Name-based lookup, invoke, get and set |
//! | ③ Messaging | [`Publisher`], [`Subscriber`] | Anonymous publish/subscribe |
//!
//! ## Shared Types
//!
//! | Type | What it is |
//! |------|-----------|
//! | [`Event`], [`Topic`], [`TopicFilter`], [`EventMatch`] | Bus messages and predicates |
//! | [`MethodSpec`], [`VariableSpec`], [`ValueKind`] | Structural description of a component |
//! | [`RegistryError`], [`ErrorKind`] | The dispatch error taxonomy with stable codes |
//! | [`DurationMs`] | Wire-stable durations for schedules |
//!
//! ## Design Principle
//!
//! Dispatch is name-based, but never reflective. A component states its
//! methods (with arity) and variables (with a declared [`ValueKind`] and
//! access mode) up front, so every structural failure is detected before the
//! component's own code runs and surfaces as a distinguishable
//! [`RegistryError`] variant.
//!
//! ## Dependency Notes
//!
//! Argument, result and variable values are `serde_json::Value`. The remote
//! bridge carries values as JSON text, so using the same model in-process
//! means a value never has to be converted twice.

#![deny(missing_docs)]

pub mod component;
pub mod dispatch;
pub mod duration;
pub mod error;
pub mod event;
pub mod id;
pub mod value;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use component::{Access, Component, MethodSpec, VariableSpec};
pub use dispatch::Dispatcher;
pub use duration::DurationMs;
pub use error::{
    ComponentError, DeliveryFailure, ErrorKind, PublishError, RegistryError, ScheduleError,
    SubscriberError,
};
pub use event::{Event, EventMatch, Publisher, Subscriber, TopicFilter, topics};
pub use id::{ComponentName, Topic};
pub use value::{Value, ValueKind};
