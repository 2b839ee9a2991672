//! # HTTP Server Tests
//!
//! Drives the axum router directly with `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{events, new_log, push_body, EventLog, RecordingGit, StaticBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use variants_sync_controller::config::ControllerConfig;
use variants_sync_controller::observability::register_metrics;
use variants_sync_controller::server::{build_router, ServerState};
use variants_sync_controller::sync::SyncOrchestrator;

struct Harness {
    router: Router,
    state: Arc<ServerState>,
    log: EventLog,
    _scratch: tempfile::TempDir,
}

fn harness() -> Harness {
    let scratch = tempfile::tempdir().unwrap();
    let log = new_log();
    let mut config = ControllerConfig::for_repository("https://example.com/org/conf", "conf");
    config.scratch_root = scratch.path().to_path_buf();

    let orchestrator = SyncOrchestrator::with_components(
        &config,
        Arc::new(RecordingGit::new("a", Arc::clone(&log), &["appX"])),
        Arc::new(StaticBuilder::new(b"kind: Deployment\n")),
    );
    let state = Arc::new(ServerState {
        orchestrator: Arc::new(orchestrator),
        is_ready: Arc::new(AtomicBool::new(true)),
    });

    Harness {
        router: build_router(&config.webhook_path, Arc::clone(&state)),
        state,
        log,
        _scratch: scratch,
    }
}

fn webhook(event: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header("content-type", "application/json")
        .header("x-github-delivery", "72d3162e-cc78-11e3-81ab-4c9367dc0958");
    if let Some(event) = event {
        builder = builder.header("x-github-event", event);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_accepted_push_is_published_and_acknowledged() {
    let h = harness();

    let response = h
        .router
        .oneshot(webhook(
            Some("push"),
            push_body("add feature", &["appX/base/deployment.yaml"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "published");
    assert_eq!(body["application"], "appX");
    assert_eq!(body["delivery"], "72d3162e-cc78-11e3-81ab-4c9367dc0958");
    assert!(events(&h.log).contains(&"a:push".to_string()));
}

#[tokio::test]
async fn test_loopback_push_is_acknowledged_without_work() {
    let h = harness();

    let response = h
        .router
        .oneshot(webhook(
            Some("push"),
            push_body("update variants", &["appX/variants/production.yaml"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "loopback");
    assert!(events(&h.log).is_empty());
}

#[tokio::test]
async fn test_malformed_and_foreign_deliveries_still_get_200() {
    let cases = [
        (Some("push"), b"{not json".to_vec(), "rejected"),
        (Some("push"), push_body("add feature", &[]), "rejected"),
        (Some("issues"), b"{}".to_vec(), "rejected"),
        (None, push_body("add feature", &["appX/a.yaml"]), "rejected"),
        (Some("ping"), b"{\"zen\":\"Keep it logically awesome.\"}".to_vec(), "ignored"),
    ];

    for (event, body, expected) in cases {
        let h = harness();
        let response = h.router.oneshot(webhook(event, body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "event {event:?}");
        assert_eq!(json_body(response).await["status"], expected, "event {event:?}");
        assert!(events(&h.log).is_empty());
    }
}

#[tokio::test]
async fn test_missing_delivery_header_gets_generated_id() {
    let h = harness();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks")
        .header("x-github-event", "ping")
        .body(Body::from("{}"))
        .unwrap();

    let response = h.router.oneshot(request).await.unwrap();
    let body = json_body(response).await;
    let delivery = body["delivery"].as_str().unwrap();
    assert!(uuid::Uuid::parse_str(delivery).is_ok(), "{delivery}");
}

#[tokio::test]
async fn test_failed_sync_still_answers_200() {
    let scratch = tempfile::tempdir().unwrap();
    let log = new_log();
    let mut config = ControllerConfig::for_repository("https://example.com/org/conf", "conf");
    config.scratch_root = scratch.path().to_path_buf();
    let orchestrator = SyncOrchestrator::with_components(
        &config,
        Arc::new(RecordingGit::new("a", Arc::clone(&log), &["appX"]).failing_push()),
        Arc::new(StaticBuilder::new(b"kind: Deployment\n")),
    );
    let state = Arc::new(ServerState {
        orchestrator: Arc::new(orchestrator),
        is_ready: Arc::new(AtomicBool::new(true)),
    });
    let router = build_router("/webhooks", state);

    let response = router
        .oneshot(webhook(
            Some("push"),
            push_body("add feature", &["appX/base/deployment.yaml"]),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "failed");
    assert!(body["detail"].as_str().unwrap().starts_with("publish:"));
}

#[tokio::test]
async fn test_status_lists_latest_runs() {
    let h = harness();
    h.router
        .clone()
        .oneshot(webhook(
            Some("push"),
            push_body("add feature", &["appX/base/deployment.yaml"]),
        ))
        .await
        .unwrap();

    let response = h
        .router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["application"], "appX");
    assert_eq!(records[0]["outcome"], "published");
}

#[tokio::test]
async fn test_health_and_readiness() {
    let h = harness();

    let response = h
        .router
        .clone()
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = h
        .router
        .clone()
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    h.state.is_ready.store(false, Ordering::Relaxed);
    let response = h
        .router
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_counters() {
    register_metrics().unwrap();
    let h = harness();
    h.router
        .clone()
        .oneshot(webhook(Some("ping"), b"{}".to_vec()))
        .await
        .unwrap();

    let response = h
        .router
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("variants_sync_webhook_deliveries_total"));
}

#[tokio::test]
async fn test_sender_disconnect_does_not_cancel_run() {
    let scratch = tempfile::tempdir().unwrap();
    let log = new_log();
    let mut config = ControllerConfig::for_repository("https://example.com/org/conf", "conf");
    config.scratch_root = scratch.path().to_path_buf();
    let orchestrator = SyncOrchestrator::with_components(
        &config,
        Arc::new(
            RecordingGit::new("a", Arc::clone(&log), &["appX"])
                .with_clone_delay(Duration::from_millis(800)),
        ),
        Arc::new(StaticBuilder::new(b"kind: Deployment\n")),
    );
    let state = Arc::new(ServerState {
        orchestrator: Arc::new(orchestrator),
        is_ready: Arc::new(AtomicBool::new(true)),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router("/webhooks", Arc::clone(&state));
    tokio::spawn(async move { axum::serve(listener, router).await });

    let body = push_body("add feature", &["appX/base/deployment.yaml"]);
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let head = format!(
        "POST /webhooks HTTP/1.1\r\nhost: {addr}\r\ncontent-type: application/json\r\n\
         x-github-event: push\r\nx-github-delivery: d-disconnect\r\n\
         content-length: {}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(&body).await.unwrap();
    stream.flush().await.unwrap();

    // Hang up while the clone is still running
    tokio::time::sleep(Duration::from_millis(200)).await;
    drop(stream);
    tokio::time::sleep(Duration::from_millis(2000)).await;

    assert!(
        events(&log).contains(&"a:push".to_string()),
        "{:?}",
        events(&log)
    );
    let record = state.orchestrator.status().get("appX").unwrap();
    assert_eq!(record.outcome, "published");
    assert_eq!(record.delivery, "d-disconnect");
}
