#![deny(missing_docs)]
//! Event bus and subscriber helpers for Pluto.
//!
//! The [`EventBus`] keeps an ordered list of subscriptions. `publish`
//! takes a snapshot of the matching subscribers under a short lock, then
//! awaits each of them in registration order with the lock released.
//! Subscriber errors are collected and reported after every matching
//! subscriber has been attempted; they never stop delivery. Nothing is
//! queued: an event published while nobody listens is dropped.

use async_trait::async_trait;
use pluto_core::error::{DeliveryFailure, PublishError, SubscriberError};
use pluto_core::event::{Event, Publisher, Subscriber, TopicFilter};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

/// Bus errors.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus was closed; it accepts no new subscriptions.
    #[error("bus is closed")]
    Closed,
}

/// Handle returned by [`EventBus::subscribe`]. Pass it to
/// [`EventBus::unsubscribe`] to stop receiving events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    /// The numeric id, as reported in [`DeliveryFailure::subscription`].
    pub fn id(&self) -> u64 {
        self.0
    }
}

struct Slot {
    id: u64,
    filter: TopicFilter,
    subscriber: Arc<dyn Subscriber>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    slots: Vec<Slot>,
    closed: bool,
}

/// Synchronous, in-process publish/subscribe channel with no history.
///
/// The bus is an ordinary value: create one, share it behind an `Arc`,
/// and [`close`](Self::close) it at shutdown.
pub struct EventBus {
    inner: RwLock<Inner>,
}

impl EventBus {
    /// Create a new open bus with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register `subscriber` for events passing `filter`.
    pub fn subscribe(
        &self,
        filter: TopicFilter,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<Subscription, BusError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.closed {
            return Err(BusError::Closed);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        tracing::debug!(subscription = id, filter = ?filter, "pluto.bus.subscribe");
        inner.slots.push(Slot {
            id,
            filter,
            subscriber,
        });
        Ok(Subscription(id))
    }

    /// Subscribe a channel; matching events are forwarded to the returned
    /// receiver.
    pub fn subscribe_channel(
        &self,
        filter: TopicFilter,
    ) -> Result<(Subscription, mpsc::UnboundedReceiver<Event>), BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(filter, Arc::new(ChannelSubscriber::new(tx)))?;
        Ok((subscription, rx))
    }

    /// Remove a subscription. Returns whether it was still registered;
    /// removing twice is not an error.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.slots.len();
        inner.slots.retain(|slot| slot.id != subscription.0);
        let removed = inner.slots.len() != before;
        if removed {
            tracing::debug!(subscription = subscription.0, "pluto.bus.unsubscribe");
        }
        removed
    }

    /// Number of current subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slots
            .len()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).closed
    }

    /// Drop every subscription and refuse new ones. Publishing on a closed
    /// bus is a no-op.
    pub fn close(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.closed {
            inner.closed = true;
            tracing::info!(dropped = inner.slots.len(), "pluto.bus.close");
            inner.slots.clear();
        }
    }

    /// Deliver `event` to every current subscriber whose filter matches.
    ///
    /// Subscribers are awaited one after another in registration order. If
    /// any of them fail, the others are still attempted and
    /// [`PublishError::Delivery`] lists every failure.
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        let targets: Vec<(u64, Arc<dyn Subscriber>)> = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            inner
                .slots
                .iter()
                .filter(|slot| slot.filter.matches(&event))
                .map(|slot| (slot.id, Arc::clone(&slot.subscriber)))
                .collect()
        };
        if targets.is_empty() {
            tracing::trace!(topic = %event.topic, "pluto.bus.publish.dropped");
            return Ok(());
        }

        let mut failures = Vec::new();
        for (id, subscriber) in &targets {
            if let Err(err) = subscriber.on_event(&event).await {
                tracing::warn!(topic = %event.topic, subscription = id, error = %err, "pluto.bus.delivery.failed");
                failures.push(DeliveryFailure {
                    subscription: *id,
                    message: err.to_string(),
                });
            }
        }
        tracing::debug!(
            topic = %event.topic,
            delivered = targets.len() - failures.len(),
            failed = failures.len(),
            "pluto.bus.publish"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError::Delivery {
                topic: event.topic.to_string(),
                attempted: targets.len(),
                failures,
            })
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Publisher for EventBus {
    async fn publish(&self, event: Event) -> Result<(), PublishError> {
        EventBus::publish(self, event).await
    }
}

/// Forwards every delivered event into an unbounded channel.
///
/// Delivery fails once the receiving half has been dropped.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSubscriber {
    /// Wrap the sending half of a channel.
    pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        self.tx
            .send(event.clone())
            .map_err(|_| SubscriberError::Failed("receiver dropped".into()))
    }
}

/// Adapts a plain closure into a [`Subscriber`].
pub struct FnSubscriber<F> {
    f: F,
}

impl<F> FnSubscriber<F>
where
    F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Subscriber for FnSubscriber<F>
where
    F: Fn(&Event) -> Result<(), SubscriberError> + Send + Sync,
{
    async fn on_event(&self, event: &Event) -> Result<(), SubscriberError> {
        (self.f)(event)
    }
}
