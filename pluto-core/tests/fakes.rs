//! In-memory fakes prove the traits are usable.
//! Run with: cargo test --features test-utils --test fakes

#![cfg(feature = "test-utils")]

use pluto_core::test_utils::{FakeComponent, RecordingSubscriber};
use pluto_core::*;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn fake_component_describes_itself() {
    let fake = FakeComponent::new("fake");
    assert_eq!(fake.name(), "fake");
    let arities: Vec<(String, usize)> = fake
        .methods()
        .into_iter()
        .map(|m| (m.name, m.arity))
        .collect();
    assert!(arities.contains(&("complex_method".to_owned(), 2)));

    let foo = fake
        .variables()
        .into_iter()
        .find(|v| v.name == "foo")
        .unwrap();
    assert!(!foo.is_writable());
}

#[tokio::test]
async fn fake_component_invokes_and_logs() {
    let mut fake = FakeComponent::new("fake");
    let log = fake.call_log();

    let result = fake
        .invoke("complex_method", vec![json!(1), json!(2)])
        .await
        .unwrap();
    assert_eq!(result, json!("silly return"));

    let err = fake.invoke("bang_bang", vec![]).await.unwrap_err();
    assert!(err.to_string().contains("BANG"));

    fake.set("bar", json!("hello")).await.unwrap();
    assert_eq!(fake.get("bar").await.unwrap(), json!("hello"));

    assert_eq!(
        log.entries(),
        vec!["invoke:complex_method", "invoke:bang_bang", "set:bar", "get:bar"]
    );
    assert_eq!(log.peak_concurrency(), 1);
}

#[tokio::test]
async fn fake_component_is_usable_as_dyn_component() {
    let mut boxed: Box<dyn Component> = Box::new(FakeComponent::new("fake"));
    assert_eq!(boxed.invoke("simple_method", vec![]).await.unwrap(), json!(null));
    assert!(boxed.get("bang").await.is_err());
    boxed.shutdown().await.unwrap();
}

#[tokio::test]
async fn recording_subscriber_records_and_optionally_fails() {
    let ok = RecordingSubscriber::new();
    ok.on_event(&Event::stop()).await.unwrap();
    assert_eq!(ok.topics(), vec![topics::STOP]);

    let failing: Arc<dyn Subscriber> = Arc::new(RecordingSubscriber::failing("nope"));
    let err = failing
        .on_event(&Event::new("x", json!(1)))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "subscriber failed: nope");
}
