//! Server lifecycle: bind failures, in-flight accounting, shutdown.

use std::time::Duration;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use serde_json::json;
use telemetry_gateway::http::{LaunchError, ServerState};
use telemetry_gateway::routing::{ApiRequest, HandlerMap, RouteSchema};
use tokio::sync::{mpsc, oneshot};

mod common;

const SCHEMA: &str = r#"{
    "GET": {
        "live": { "response": "stream:live" },
        "slow": {}
    }
}"#;

/// Streams one event, then waits for shutdown and reports whether the
/// stream was closed underneath it.
fn live_handler(report: mpsc::UnboundedSender<bool>) -> HandlerMap {
    HandlerMap::new().with(Method::GET, "live", move |request: ApiRequest| {
        let report = report.clone();
        async move {
            let stream = request.event_stream.clone().unwrap();
            stream.write_data(Some("1"), &json!({"tick": 1}));
            request.shutdown.cancelled().await;

            for _ in 0..50 {
                if stream.is_closed() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            let _ = report.send(stream.is_closed());
            StatusCode::OK.into_response()
        }
    })
}

#[tokio::test]
async fn shutdown_closes_open_streams() {
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    let server = common::start_gateway(SCHEMA, live_handler(report_tx)).await;

    let mut response = common::client()
        .get(common::url(&server, "/api/v1/live"))
        .header("accept", "text/event-stream")
        .send()
        .await
        .unwrap();

    let first = common::within(5, response.chunk()).await.unwrap().unwrap();
    assert_eq!(&first[..], b"data: {\"id\":\"1\",\"tick\":1}\n\n");
    assert_eq!(server.in_flight(), 1);

    assert!(server.shutdown());
    assert!(!server.shutdown());
    assert_ne!(server.state(), ServerState::Listening);

    // The body is cut off rather than ended with a terminal event.
    let rest = common::within(5, response.chunk()).await;
    assert!(rest.is_err() || rest.unwrap().is_none());

    assert!(common::within(5, report_rx.recv()).await.unwrap());
    common::within(10, server.closed()).await;
    assert_eq!(server.state(), ServerState::Closed);
    assert_eq!(server.in_flight(), 0);
}

#[tokio::test]
async fn shutdown_answers_running_handlers_with_503() {
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let started_tx = std::sync::Mutex::new(Some(started_tx));

    let handlers = HandlerMap::new().with(Method::GET, "slow", move |_request: ApiRequest| {
        if let Some(tx) = started_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            StatusCode::OK.into_response()
        }
    });
    let server = common::start_gateway(SCHEMA, handlers).await;

    let request = common::client().get(common::url(&server, "/api/v1/slow")).send();
    let pending = tokio::spawn(request);

    common::within(5, started_rx).await.unwrap();
    server.shutdown();

    let response = common::within(5, pending).await.unwrap().unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text().await.unwrap(), "server shutdown");
    common::within(10, server.closed()).await;
}

#[tokio::test]
async fn second_bind_on_same_port_fails() {
    let first = common::start_gateway(SCHEMA, HandlerMap::new()).await;

    let mut config = common::loopback_config();
    config.web.server = first.local_addr().to_string();
    let err = telemetry_gateway::launch(&config, &RouteSchema::default(), &HandlerMap::new())
        .await
        .unwrap_err();

    match err {
        LaunchError::Listen { source, .. } => {
            assert_eq!(source.kind(), std::io::ErrorKind::AddrInUse)
        }
        other => panic!("unexpected error: {other}"),
    }
    first.shutdown();
}

#[tokio::test]
async fn unknown_group_fails_launch() {
    let schema = RouteSchema::from_json(r#"{"GET": {"x": {"parms": ["bogus"]}}}"#).unwrap();
    let handlers = HandlerMap::new().with(Method::GET, "x", |_request: ApiRequest| async {
        StatusCode::OK.into_response()
    });
    let err = telemetry_gateway::launch(&common::loopback_config(), &schema, &handlers)
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::Router(_)));
}

#[tokio::test]
async fn base_url_uses_bound_port() {
    let server = common::start_gateway(SCHEMA, HandlerMap::new()).await;
    let expected = format!("http://127.0.0.1:{}", server.local_addr().port());
    assert_eq!(server.base_url(), Some(expected.as_str()));
    server.shutdown();
}
