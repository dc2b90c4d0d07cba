use pluto_bus::{BusError, EventBus, FnSubscriber};
use pluto_core::error::SubscriberError;
use pluto_core::test_utils::RecordingSubscriber;
use pluto_core::{Event, PublishError, Publisher, Subscriber, TopicFilter};
use serde_json::json;
use std::sync::{Arc, Mutex};

// --- Empty bus ---

#[tokio::test]
async fn publish_without_subscribers_is_a_noop() {
    let bus = EventBus::new();
    bus.publish(Event::new("nobody.listens", json!(1)))
        .await
        .unwrap();
    assert_eq!(bus.subscriber_count(), 0);
    assert!(!bus.is_closed());
}

#[tokio::test]
async fn events_are_not_queued_for_later_subscribers() {
    let bus = EventBus::new();
    bus.publish(Event::new("early", json!(null))).await.unwrap();

    let late = Arc::new(RecordingSubscriber::new());
    bus.subscribe(TopicFilter::All, late.clone()).unwrap();
    assert!(late.events().is_empty());
}

// --- Filtering ---

#[tokio::test]
async fn topic_filter_selects_events() {
    let bus = EventBus::new();
    let all = Arc::new(RecordingSubscriber::new());
    let only_stop = Arc::new(RecordingSubscriber::new());
    bus.subscribe(TopicFilter::All, all.clone()).unwrap();
    bus.subscribe(TopicFilter::topic("stop"), only_stop.clone())
        .unwrap();

    bus.publish(Event::new("tick", json!(1))).await.unwrap();
    bus.publish(Event::stop()).await.unwrap();

    assert_eq!(all.topics(), vec!["tick", "stop"]);
    assert_eq!(only_stop.topics(), vec!["stop"]);
}

// --- Ordering ---

/// A subscriber that records its name for ordering verification.
struct NamedSubscriber {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait::async_trait]
impl Subscriber for NamedSubscriber {
    async fn on_event(&self, _event: &Event) -> Result<(), SubscriberError> {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }
}

#[tokio::test]
async fn delivery_follows_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let bus = EventBus::new();
    for name in ["first", "second", "third"] {
        bus.subscribe(
            TopicFilter::All,
            Arc::new(NamedSubscriber {
                name,
                log: log.clone(),
            }),
        )
        .unwrap();
    }

    bus.publish(Event::new("x", json!(null))).await.unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
}

// --- Failure isolation ---

#[tokio::test]
async fn failing_subscriber_does_not_stop_delivery() {
    let bus = EventBus::new();
    let a = Arc::new(RecordingSubscriber::failing("A exploded"));
    let b = Arc::new(RecordingSubscriber::new());
    let sub_a = bus.subscribe(TopicFilter::All, a.clone()).unwrap();
    bus.subscribe(TopicFilter::All, b.clone()).unwrap();

    let err = bus
        .publish(Event::new("reading", json!(3)))
        .await
        .unwrap_err();

    assert_eq!(b.events().len(), 1, "B still receives the event");
    let PublishError::Delivery {
        topic,
        attempted,
        failures,
    } = err
    else {
        panic!("unexpected error variant");
    };
    assert_eq!(topic, "reading");
    assert_eq!(attempted, 2);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subscription, sub_a.id());
    assert!(failures[0].message.contains("A exploded"));
}

// --- Unsubscribe ---

#[tokio::test]
async fn unsubscribe_stops_delivery_and_is_idempotent() {
    let bus = EventBus::new();
    let sub = Arc::new(RecordingSubscriber::new());
    let handle = bus.subscribe(TopicFilter::All, sub.clone()).unwrap();

    assert!(bus.unsubscribe(handle));
    assert!(!bus.unsubscribe(handle));

    bus.publish(Event::new("x", json!(1))).await.unwrap();
    assert!(sub.events().is_empty());
}

#[tokio::test]
async fn subscription_added_during_delivery_misses_that_event() {
    let bus = Arc::new(EventBus::new());
    let late = Arc::new(RecordingSubscriber::new());
    {
        let bus_for_closure = Arc::downgrade(&bus);
        let late = late.clone();
        bus.subscribe(
            TopicFilter::topic("x"),
            Arc::new(FnSubscriber::new(move |_event: &Event| {
                if let Some(bus) = bus_for_closure.upgrade() {
                    let _ = bus.subscribe(TopicFilter::All, late.clone());
                }
                Ok(())
            })),
        )
        .unwrap();
    }

    bus.publish(Event::new("x", json!(1))).await.unwrap();
    assert!(late.events().is_empty());

    bus.publish(Event::new("y", json!(2))).await.unwrap();
    assert_eq!(late.topics(), vec!["y"]);
}

// --- Channels ---

#[tokio::test]
async fn channel_subscription_forwards_events() {
    let bus = EventBus::new();
    let (_handle, mut rx) = bus.subscribe_channel(TopicFilter::topic("ping")).unwrap();
    bus.publish(Event::new("ping", json!({"n": 1}))).await.unwrap();
    bus.publish(Event::new("pong", json!({"n": 2}))).await.unwrap();

    let received = rx.recv().await.unwrap();
    assert_eq!(received.payload, json!({"n": 1}));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_channel_receiver_reports_failure() {
    let bus = EventBus::new();
    let (_handle, rx) = bus.subscribe_channel(TopicFilter::All).unwrap();
    drop(rx);
    assert!(bus.publish(Event::new("x", json!(1))).await.is_err());
}

// --- Lifecycle ---

#[tokio::test]
async fn closed_bus_rejects_subscriptions_and_drops_publishes() {
    let bus = EventBus::new();
    let sub = Arc::new(RecordingSubscriber::new());
    bus.subscribe(TopicFilter::All, sub.clone()).unwrap();

    bus.close();
    assert!(bus.is_closed());
    assert_eq!(bus.subscriber_count(), 0);
    assert_eq!(
        bus.subscribe(TopicFilter::All, sub.clone()).unwrap_err(),
        BusError::Closed
    );

    bus.publish(Event::new("x", json!(1))).await.unwrap();
    assert!(sub.events().is_empty());
}

#[tokio::test]
async fn bus_is_usable_as_dyn_publisher() {
    let bus = Arc::new(EventBus::new());
    let sub = Arc::new(RecordingSubscriber::new());
    bus.subscribe(TopicFilter::All, sub.clone()).unwrap();

    let publisher: Arc<dyn Publisher> = bus.clone();
    publisher.publish(Event::stop()).await.unwrap();
    assert_eq!(sub.topics(), vec!["stop"]);
}
