//! # Metrics
//!
//! Prometheus metrics for monitoring the sync controller.
//!
//! ## Metrics Exposed
//!
//! - `variants_sync_webhook_deliveries_total{event}` - Webhook deliveries received, by event kind
//! - `variants_sync_routing_rejections_total{reason}` - Deliveries the router rejected
//! - `variants_sync_loopback_skips_total` - Pushes dropped because they carry the sentinel message
//! - `variants_sync_runs_total` - Pipeline runs started
//! - `variants_sync_run_errors_total{stage}` - Pipeline runs aborted, by failing stage
//! - `variants_sync_run_duration_seconds` - Duration of pipeline runs, lock wait included
//! - `variants_sync_git_clone_total` - Repository clones
//! - `variants_sync_git_clone_duration_seconds` - Duration of clones
//! - `variants_sync_git_clone_errors_total` - Failed clones
//! - `variants_sync_kustomize_build_total` - Overlay builds
//! - `variants_sync_kustomize_build_duration_seconds` - Duration of overlay builds
//! - `variants_sync_kustomize_build_errors_total` - Failed overlay builds
//! - `variants_sync_publish_total{outcome}` - Publish attempts by outcome (`pushed`, `unchanged`, failing step)

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static WEBHOOK_DELIVERIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "variants_sync_webhook_deliveries_total",
            "Total number of webhook deliveries received",
        ),
        &["event"],
    )
    .expect("Failed to create WEBHOOK_DELIVERIES_TOTAL metric - this should never happen")
});

static ROUTING_REJECTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "variants_sync_routing_rejections_total",
            "Total number of webhook deliveries rejected by the router",
        ),
        &["reason"],
    )
    .expect("Failed to create ROUTING_REJECTIONS_TOTAL metric - this should never happen")
});

static LOOPBACK_SKIPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "variants_sync_loopback_skips_total",
        "Total number of pushes skipped because the controller authored them",
    )
    .expect("Failed to create LOOPBACK_SKIPS_TOTAL metric - this should never happen")
});

static RUNS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("variants_sync_runs_total", "Total number of pipeline runs")
        .expect("Failed to create RUNS_TOTAL metric - this should never happen")
});

static RUN_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "variants_sync_run_errors_total",
            "Total number of pipeline runs aborted by a stage failure",
        ),
        &["stage"],
    )
    .expect("Failed to create RUN_ERRORS_TOTAL metric - this should never happen")
});

static RUN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "variants_sync_run_duration_seconds",
            "Duration of pipeline runs in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .expect("Failed to create RUN_DURATION metric - this should never happen")
});

static GIT_CLONE_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "variants_sync_git_clone_total",
        "Total number of repository clones",
    )
    .expect("Failed to create GIT_CLONE_TOTAL metric - this should never happen")
});

static GIT_CLONE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "variants_sync_git_clone_duration_seconds",
            "Duration of repository clones in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
    )
    .expect("Failed to create GIT_CLONE_DURATION metric - this should never happen")
});

static GIT_CLONE_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "variants_sync_git_clone_errors_total",
        "Total number of failed repository clones",
    )
    .expect("Failed to create GIT_CLONE_ERRORS_TOTAL metric - this should never happen")
});

static KUSTOMIZE_BUILD_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "variants_sync_kustomize_build_total",
        "Total number of kustomize builds",
    )
    .expect("Failed to create KUSTOMIZE_BUILD_TOTAL metric - this should never happen")
});

static KUSTOMIZE_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "variants_sync_kustomize_build_duration_seconds",
            "Duration of kustomize builds in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create KUSTOMIZE_BUILD_DURATION metric - this should never happen")
});

static KUSTOMIZE_BUILD_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "variants_sync_kustomize_build_errors_total",
        "Total number of failed kustomize builds",
    )
    .expect("Failed to create KUSTOMIZE_BUILD_ERRORS_TOTAL metric - this should never happen")
});

static PUBLISH_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "variants_sync_publish_total",
            "Total number of publish attempts by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create PUBLISH_TOTAL metric - this should never happen")
});

fn register<C>(collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    match REGISTRY.register(Box::new(collector.clone())) {
        // register_metrics may run more than once per process
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Register every controller metric with [`REGISTRY`].
///
/// Fails only if a metric clashes with an incompatible one already registered.
#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    register(&*WEBHOOK_DELIVERIES_TOTAL)?;
    register(&*ROUTING_REJECTIONS_TOTAL)?;
    register(&*LOOPBACK_SKIPS_TOTAL)?;
    register(&*RUNS_TOTAL)?;
    register(&*RUN_ERRORS_TOTAL)?;
    register(&*RUN_DURATION)?;
    register(&*GIT_CLONE_TOTAL)?;
    register(&*GIT_CLONE_DURATION)?;
    register(&*GIT_CLONE_ERRORS_TOTAL)?;
    register(&*KUSTOMIZE_BUILD_TOTAL)?;
    register(&*KUSTOMIZE_BUILD_DURATION)?;
    register(&*KUSTOMIZE_BUILD_ERRORS_TOTAL)?;
    register(&*PUBLISH_TOTAL)?;

    Ok(())
}

/// Render the registry in the Prometheus text exposition format
#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only if the encoder rejects a metric family"
)]
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_webhook_deliveries(event: &str) {
    WEBHOOK_DELIVERIES_TOTAL.with_label_values(&[event]).inc();
}

pub fn increment_routing_rejections(reason: &str) {
    ROUTING_REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_loopback_skips() {
    LOOPBACK_SKIPS_TOTAL.inc();
}

pub fn increment_runs() {
    RUNS_TOTAL.inc();
}

pub fn increment_run_errors(stage: &str) {
    RUN_ERRORS_TOTAL.with_label_values(&[stage]).inc();
}

pub fn observe_run_duration(duration: f64) {
    RUN_DURATION.observe(duration);
}

pub fn increment_git_clone_total() {
    GIT_CLONE_TOTAL.inc();
}

pub fn observe_git_clone_duration(duration: f64) {
    GIT_CLONE_DURATION.observe(duration);
}

pub fn increment_git_clone_errors_total() {
    GIT_CLONE_ERRORS_TOTAL.inc();
}

pub fn increment_kustomize_build_total() {
    KUSTOMIZE_BUILD_TOTAL.inc();
}

pub fn observe_kustomize_build_duration(duration: f64) {
    KUSTOMIZE_BUILD_DURATION.observe(duration);
}

pub fn increment_kustomize_build_errors_total() {
    KUSTOMIZE_BUILD_ERRORS_TOTAL.inc();
}

pub fn increment_publish_total(outcome: &str) {
    PUBLISH_TOTAL.with_label_values(&[outcome]).inc();
}
