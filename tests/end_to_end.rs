//! End-to-end: a remote client drives components that a running schedule
//! is waiting on, across the bridge, the registry, the bus and the
//! scheduler.

use pluto::prelude::*;
use pluto::StopReason;
use pluto_core::test_utils::FakeComponent;
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

fn config() -> AppConfig {
    AppConfig::default().with_delegator(
        DelegatorConfig::default().with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0))),
    )
}

#[tokio::test]
async fn remote_write_releases_a_waiting_schedule() {
    let app = Application::new(config());
    app.register(FakeComponent::new("pump")).unwrap();
    let running = app.start().await.unwrap();
    let client = DelegatorClient::connect(running.delegator_addr().unwrap())
        .await
        .unwrap();

    let go = EventMatch::topic(topics::VARIABLE_UPDATE)
        .with_payload(json!({"component": "pump", "variable": "bar", "value": "go"}));
    let schedule = Schedule::new("prime the pump")
        .then(Instruction::wait_event(go).with_timeout(DurationMs::from_secs(5)))
        .then(Instruction::call("pump", "complex_method", [json!(1), json!(2)]))
        .then(Instruction::set("pump", [("count", json!(5))]));
    let scheduler = running.scheduler();
    scheduler.start(schedule).unwrap();

    let mut states = scheduler.watch_state();
    states
        .wait_for(|state| *state == RunState::Running { position: 0 })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // A non-matching write does not release the wait.
    client.set_variable("pump", "bar", &json!("hold")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(scheduler.state(), RunState::Running { position: 0 });

    client.set_variable("pump", "bar", &json!("go")).await.unwrap();
    let report = tokio::time::timeout(Duration::from_secs(5), scheduler.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(report.is_completed(), "{report:?}");
    assert_eq!(client.get_variable("pump", "count").await.unwrap(), json!(5));

    running.bus().publish(Event::stop()).await.unwrap();
    let shutdown = running.wait().await.unwrap();
    assert_eq!(shutdown.reason, StopReason::StopEvent);
}

#[tokio::test]
async fn remote_failure_codes_and_scheduler_failure_agree() {
    let app = Application::new(config());
    app.register(FakeComponent::new("pump")).unwrap();
    let running = app.start().await.unwrap();
    let client = DelegatorClient::connect(running.delegator_addr().unwrap())
        .await
        .unwrap();

    let remote = client
        .call_method("pump", "bang_bang", vec![])
        .await
        .unwrap_err();
    assert_eq!(remote.code(), Some(ErrorCode::InvocationFailed));

    let report = running
        .scheduler()
        .run(
            Schedule::new("misfire")
                .then(Instruction::call("pump", "simple_method", []))
                .then(Instruction::call("pump", "bang_bang", []))
                .then(Instruction::set("pump", [("count", json!(1))])),
        )
        .await
        .unwrap();
    let (position, error) = report.failure().unwrap();
    assert_eq!(position, 1);
    assert_eq!(
        ErrorCode::from(error.kind()),
        remote.code().unwrap()
    );
    assert_eq!(client.get_variable("pump", "count").await.unwrap(), json!(0));

    running.stop();
    running.wait().await.unwrap();
}

#[tokio::test]
async fn cancelling_a_parked_schedule_leaves_the_bridge_serving() {
    let app = Application::new(config());
    app.register(FakeComponent::new("pump")).unwrap();
    let running = app.start().await.unwrap();
    let client = DelegatorClient::connect(running.delegator_addr().unwrap())
        .await
        .unwrap();

    let scheduler = running.scheduler();
    scheduler
        .start(
            Schedule::new("long soak")
                .then(Instruction::wait_duration(DurationMs::from_secs(30)))
                .then(Instruction::set("pump", [("count", json!(9))])),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.cancel();

    let report = tokio::time::timeout(Duration::from_secs(2), scheduler.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.state, RunState::Cancelled { position: 0 });
    assert_eq!(client.get_variable("pump", "count").await.unwrap(), json!(0));

    running.stop();
    running.wait().await.unwrap();
}
