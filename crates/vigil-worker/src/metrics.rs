//! Pipeline metrics.

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::connection::StatusSummary;
use crate::error::{WorkerError, WorkerResult};

pub use vigil_models::metric_names as names;

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn install_prometheus(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))?;
    describe_metrics();
    Ok(())
}

/// Register help text for every metric the pipeline emits.
pub fn describe_metrics() {
    for (name, help) in [
        (names::SOURCES_FAILED, "Sources that exhausted their reconnect budget"),
        (names::FRAME_READ_FAILURES, "Frame reads that failed"),
        (names::TRIGGERS_TOTAL, "Tracks that passed the consecutive-window gate"),
        (names::DUPLICATES_SUPPRESSED_TOTAL, "Triggers suppressed by the dedupe gate"),
        (names::RECORDER_RESTARTS, "Segment recorder restarts"),
        (names::SEGMENTS_PRUNED, "Segments removed by retention"),
        (names::JOBS_ENQUEUED_TOTAL, "Clip jobs accepted by the queue"),
        (names::JOBS_DROPPED_TOTAL, "Clip jobs dropped by the queue"),
        (names::JOBS_COMPLETED_TOTAL, "Clip jobs that produced an alert"),
        (names::JOBS_FAILED_TOTAL, "Clip jobs that failed"),
        (names::ALERTS_STORED_TOTAL, "Alerts persisted"),
    ] {
        describe_counter!(name, help);
    }
    describe_gauge!(names::SOURCES, "Sources per connection status");
    describe_gauge!(names::QUEUE_DEPTH, "Clip jobs waiting in the queue");
    describe_histogram!(
        names::CLIP_ENCODE_SECONDS,
        Unit::Seconds,
        "Time spent encoding one clip"
    );
}

/// Publish per-status source counts.
pub fn record_source_status(summary: &StatusSummary) {
    for (status, count) in [
        ("connected", summary.connected),
        ("disconnected", summary.disconnected),
        ("failed", summary.failed),
        ("in_progress", summary.in_progress),
    ] {
        gauge!(names::SOURCES, "status" => status).set(count as f64);
    }
}

pub fn record_frame_read_failure(camera_id: &str) {
    counter!(names::FRAME_READ_FAILURES, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn record_recorder_restart(camera_id: &str) {
    counter!(names::RECORDER_RESTARTS, "camera_id" => camera_id.to_string()).increment(1);
}

pub fn record_segments_pruned(count: usize) {
    counter!(names::SEGMENTS_PRUNED).increment(count as u64);
}

pub fn record_job_completed(camera_id: &str) {
    counter!(names::JOBS_COMPLETED_TOTAL, "camera_id" => camera_id.to_string()).increment(1);
    counter!(names::ALERTS_STORED_TOTAL).increment(1);
}

/// `reason` is a short fixed label, e.g. `no_segments`.
pub fn record_job_failed(camera_id: &str, reason: &'static str) {
    counter!(
        names::JOBS_FAILED_TOTAL,
        "camera_id" => camera_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}
