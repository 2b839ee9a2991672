//! # HTTP Server
//!
//! Webhook receiver plus metrics and health endpoints.
//!
//! Provides endpoints:
//! - `POST <webhook_path>` - GitHub push deliveries (default `/webhooks`)
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once startup has finished)
//! - `/status` - Latest sync record per application
//!
//! Webhook deliveries are always answered with `200 OK`. The JSON body says
//! what was done; failures are reported through logs, metrics and `/status`,
//! never through the response code. Each run executes on its own task, so a
//! sender that disconnects before the answer does not stop the run.

use crate::constants::{DELIVERY_HEADER, EVENT_HEADER};
use crate::observability::metrics;
use crate::sync::{SyncOrchestrator, SyncOutcome};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct ServerState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub is_ready: Arc<AtomicBool>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("repository", &self.orchestrator.repo_name())
            .field("is_ready", &self.is_ready.load(Ordering::Relaxed))
            .finish()
    }
}

/// Acknowledgment returned for every webhook delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub delivery: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl WebhookAck {
    #[must_use]
    pub fn new(delivery: String, outcome: &SyncOutcome) -> Self {
        let mut ack = Self {
            status: outcome.status(),
            delivery,
            application: None,
            commit: None,
            detail: None,
        };
        match outcome {
            SyncOutcome::Ignored => {}
            SyncOutcome::Rejected(reason) => ack.detail = Some(reason.to_string()),
            SyncOutcome::Loopback { commit_id } => ack.commit = Some(commit_id.clone()),
            SyncOutcome::Published {
                application,
                commit,
            } => {
                ack.application = Some(application.clone());
                ack.commit = Some(commit.clone());
            }
            SyncOutcome::Unchanged { application } => {
                ack.application = Some(application.clone());
            }
            SyncOutcome::Failed {
                application,
                stage,
                error,
            } => {
                ack.application = Some(application.clone());
                ack.detail = Some(format!("{stage}: {error}"));
            }
        }
        ack
    }

    /// Acknowledgment for a run whose task panicked or was cancelled
    #[must_use]
    pub fn aborted(delivery: String, detail: &str) -> Self {
        Self {
            status: "failed",
            delivery,
            application: None,
            commit: None,
            detail: Some(detail.to_string()),
        }
    }
}

/// Router with every endpoint mounted; `webhook_path` must start with `/`
pub fn build_router(webhook_path: &str, state: Arc<ServerState>) -> Router {
    Router::new()
        .route(webhook_path, post(webhook_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/status", get(status_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves, then drain in-flight requests
pub async fn start_server<F>(
    listen_addr: &str,
    webhook_path: &str,
    state: Arc<ServerState>,
    shutdown: F,
) -> Result<(), anyhow::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(webhook_path, state);

    let listener = TcpListener::bind(listen_addr).await?;

    info!(
        "HTTP server listening on {} (webhook path {})",
        listen_addr, webhook_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let event = header_value(&headers, EVENT_HEADER).map(str::to_string);
    let delivery = header_value(&headers, DELIVERY_HEADER)
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), str::to_string);

    // Detached so a sender hanging up cannot cancel a run halfway through
    let orchestrator = Arc::clone(&state.orchestrator);
    let task_delivery = delivery.clone();
    let run = tokio::spawn(async move {
        orchestrator
            .handle_push(event.as_deref(), &body, &task_delivery)
            .await
    });

    let ack = match run.await {
        Ok(outcome) => WebhookAck::new(delivery, &outcome),
        Err(e) => {
            error!("Sync task for delivery {} did not complete: {}", delivery, e);
            WebhookAck::aborted(delivery, &e.to_string())
        }
    };

    (StatusCode::OK, Json(ack))
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::gather_text() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}"),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.orchestrator.status().snapshot())
}
