//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus recorder initialization
//! - Metric descriptions
//! - Helpers for recording pipeline and delivery metrics

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    let mut installed = false;
    // get_or_init blocks concurrent callers until the recorder is in place.
    PROMETHEUS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Failed to set global metrics recorder (already set)");
        } else {
            installed = true;
            describe_metrics();
            tracing::info!("Prometheus metrics initialized");
        }
        handle
    });
    installed
}

fn describe_metrics() {
    describe_counter!(
        "docflow_jobs_total",
        "Document jobs finished, by outcome (completed or failed)"
    );
    describe_histogram!(
        "docflow_stage_duration_seconds",
        "Duration of each pipeline stage in seconds"
    );
    describe_counter!(
        "docflow_progress_events_total",
        "Progress events offered to live subscribers, by delivery result"
    );
    describe_gauge!(
        "docflow_live_connections",
        "Currently registered live-update connections"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Record a finished job.
pub fn record_job(outcome: &str) {
    counter!("docflow_jobs_total", "outcome" => outcome.to_string()).increment(1);
}

/// Record how long one stage ran, successful or not.
pub fn record_stage(stage: &str, duration: Duration) {
    histogram!("docflow_stage_duration_seconds", "stage" => stage.to_string())
        .record(duration.as_secs_f64());
}

pub fn record_progress_event(delivered: bool) {
    counter!(
        "docflow_progress_events_total",
        "delivered" => if delivered { "true" } else { "false" }
    )
    .increment(1);
}

pub fn set_live_connections(count: usize) {
    gauge!("docflow_live_connections").set(count as f64);
}
