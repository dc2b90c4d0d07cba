use pluto_core::Dispatcher;
use pluto_core::test_utils::FakeComponent;
use pluto_delegator::{ClientError, DelegatorClient, DelegatorConfig, DelegatorServer, ErrorCode};
use pluto_registry::ComponentRegistry;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Running {
    addr: SocketAddr,
    registry: Arc<ComponentRegistry>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

async fn serve(config: DelegatorConfig) -> Running {
    let registry = Arc::new(ComponentRegistry::new());
    registry.register(FakeComponent::new("fake")).unwrap();
    registry.register(FakeComponent::new("other")).unwrap();
    let dispatcher: Arc<dyn Dispatcher> = registry.clone();

    let config = config.with_bind_addr(SocketAddr::from(([127, 0, 0, 1], 0)));
    let server = DelegatorServer::bind(dispatcher, &config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let task = tokio::spawn(async move {
        server.serve(token).await.unwrap();
    });
    Running {
        addr,
        registry,
        shutdown,
        task,
    }
}

/// Send raw lines and read one response line per request.
async fn exchange(addr: SocketAddr, lines: &[&str]) -> Vec<Value> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    for line in lines {
        write.write_all(line.as_bytes()).await.unwrap();
        write.write_all(b"\n").await.unwrap();
    }
    let mut reader = BufReader::new(read).lines();
    let mut responses = Vec::new();
    for _ in lines {
        let line = reader.next_line().await.unwrap().unwrap();
        responses.push(serde_json::from_str(&line).unwrap());
    }
    responses
}

#[tokio::test]
async fn client_covers_every_operation() {
    let running = serve(DelegatorConfig::default()).await;
    let client = DelegatorClient::connect(running.addr).await.unwrap();

    assert_eq!(client.list_components().await.unwrap(), ["fake", "other"]);
    assert!(
        client
            .list_methods("fake")
            .await
            .unwrap()
            .contains(&"complex_method".to_owned())
    );
    assert!(
        client
            .list_variables("fake")
            .await
            .unwrap()
            .contains(&"long_a".to_owned())
    );

    let result = client
        .call_method("fake", "complex_method", vec![json!(1), json!("two")])
        .await
        .unwrap();
    assert_eq!(result, json!("silly return"));
    assert_eq!(
        client
            .call_method("fake", "simple_method", vec![])
            .await
            .unwrap(),
        Value::Null
    );

    client
        .set_variable("fake", "bar", &json!({"a": [1, 2.5, "x"]}))
        .await
        .unwrap();
    assert_eq!(
        client.get_variable("fake", "bar").await.unwrap(),
        json!({"a": [1, 2.5, "x"]})
    );
    assert_eq!(
        running.registry.get_variable("fake", "bar").await.unwrap(),
        json!({"a": [1, 2.5, "x"]})
    );

    running.shutdown.cancel();
}

#[tokio::test]
async fn remote_failures_surface_as_codes() {
    let running = serve(DelegatorConfig::default()).await;
    let client = DelegatorClient::connect(running.addr).await.unwrap();

    let err = client
        .call_method("fake", "bang_bang", vec![])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::InvocationFailed));
    assert!(err.to_string().contains("BANG!"));

    let err = client
        .call_method("fake", "complex_method", vec![json!(1)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ArityMismatch));

    let err = client.get_variable("ghost", "foo").await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));

    let err = client
        .set_variable("fake", "foo", &json!(1))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Remote(ref remote) if remote.code == ErrorCode::ReadOnlyVariable));

    running.shutdown.cancel();
}

#[tokio::test]
async fn requests_on_one_connection_run_concurrently() {
    let running = serve(DelegatorConfig::default()).await;
    let client = Arc::new(DelegatorClient::connect(running.addr).await.unwrap());

    // Different components proceed in parallel; a slow call does not hold
    // up the connection.
    let started = Instant::now();
    let slow_a = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_method("fake", "sleep", vec![json!(300)]).await })
    };
    let slow_b = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call_method("other", "sleep", vec![json!(300)]).await })
    };
    assert_eq!(client.list_components().await.unwrap().len(), 2);

    assert_eq!(slow_a.await.unwrap().unwrap(), json!(300));
    assert_eq!(slow_b.await.unwrap().unwrap(), json!(300));
    assert!(started.elapsed() < Duration::from_millis(550));

    running.shutdown.cancel();
}

#[tokio::test]
async fn responses_are_matched_by_id_not_order() {
    let running = serve(DelegatorConfig::default()).await;
    let responses = exchange(
        running.addr,
        &[
            r#"{"id":1,"version":"1","op":"call_method","component":"fake","method":"sleep","args":["200"]}"#,
            r#"{"id":2,"version":"1","op":"list_components"}"#,
        ],
    )
    .await;
    assert_eq!(responses[0]["id"], 2);
    assert_eq!(responses[1]["id"], 1);
    assert_eq!(responses[1]["result"], "200");

    running.shutdown.cancel();
}

#[tokio::test]
async fn wrong_version_over_the_wire() {
    let running = serve(DelegatorConfig::default()).await;
    let responses = exchange(
        running.addr,
        &[r#"{"id":12,"version":"0","op":"list_components"}"#],
    )
    .await;
    assert_eq!(
        responses[0],
        json!({
            "id": 12,
            "status": "error",
            "code": "unsupported_version",
            "message": "unsupported protocol version \"0\", expected \"1\""
        })
    );
    running.shutdown.cancel();
}

#[tokio::test]
async fn oversize_frames_are_rejected_and_connection_closed() {
    let running = serve(DelegatorConfig::default().with_max_frame_len(128)).await;
    let big = format!(
        r#"{{"id":1,"version":"1","op":"set_variable","component":"fake","variable":"bar","value":"\"{}\""}}"#,
        "x".repeat(512)
    );

    let stream = TcpStream::connect(running.addr).await.unwrap();
    let (read, mut write) = stream.into_split();
    write.write_all(big.as_bytes()).await.unwrap();
    write.write_all(b"\n").await.unwrap();

    let mut reader = BufReader::new(read).lines();
    let line = reader.next_line().await.unwrap().unwrap();
    let response: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["id"], 0);
    assert_eq!(response["code"], "invalid_request");
    assert!(matches!(reader.next_line().await, Ok(None) | Err(_)));

    assert_eq!(
        running.registry.get_variable("fake", "bar").await.unwrap(),
        json!(0)
    );

    // Other connections are unaffected.
    let client = DelegatorClient::connect(running.addr).await.unwrap();
    assert_eq!(client.list_components().await.unwrap().len(), 2);

    running.shutdown.cancel();
}

#[tokio::test]
async fn large_responses_reach_the_client() {
    let running = serve(DelegatorConfig::default().with_max_frame_len(8 * 1024 * 1024)).await;
    let client = DelegatorClient::connect(running.addr).await.unwrap();
    let big = json!("x".repeat(2 * 1024 * 1024));

    client.set_variable("fake", "bar", &big).await.unwrap();
    assert_eq!(client.get_variable("fake", "bar").await.unwrap(), big);
    assert_eq!(client.list_components().await.unwrap(), ["fake", "other"]);
}

#[tokio::test]
async fn oversize_response_fails_only_its_request() {
    let running = serve(DelegatorConfig::default()).await;
    let client = DelegatorClient::connect_with(running.addr, 1024).await.unwrap();

    client
        .set_variable("fake", "bar", &json!("x".repeat(4096)))
        .await
        .unwrap();
    let err = client.get_variable("fake", "bar").await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol(_)), "{err:?}");

    assert_eq!(client.list_components().await.unwrap(), ["fake", "other"]);
    assert_eq!(
        client.get_variable("fake", "baz").await.unwrap(),
        json!(0),
        "the connection stays usable"
    );
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let running = serve(DelegatorConfig::default()).await;
    running.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), running.task)
        .await
        .expect("server stops")
        .unwrap();

    let refused = DelegatorClient::connect(running.addr).await;
    assert!(matches!(refused, Err(ClientError::Io(_))));
}

#[tokio::test]
async fn client_reports_closed_connection() {
    let running = serve(DelegatorConfig::default()).await;
    let client = DelegatorClient::connect(running.addr).await.unwrap();
    assert_eq!(client.list_components().await.unwrap().len(), 2);

    running.shutdown.cancel();
    let _ = running.task.await;

    let err = client.list_components().await.unwrap_err();
    assert!(
        matches!(
            err,
            ClientError::Closed | ClientError::Io(_) | ClientError::Protocol(_)
        ),
        "unexpected {err:?}"
    );
}
