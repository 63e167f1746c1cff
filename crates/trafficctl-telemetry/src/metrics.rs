//! Prometheus metrics for the traffic controller console.
//!
//! Covers:
//! - Poll outcomes and latency per endpoint
//! - Out-of-order responses dropped by the sequence gate
//! - Snapshot age
//! - Command dispatch outcomes
//! - Camera aggregation activity
//! - Last observed controller mode
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which is a startup bug, and only happens
//! during static initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, GaugeVec, HistogramVec, IntGauge, TextEncoder,
};

/// Poll attempts by endpoint and outcome (ok/error).
pub static POLL_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trafficctl_poll_total",
        "Controller poll attempts by endpoint and outcome",
        &["endpoint", "outcome"]
    )
    .unwrap()
});

/// Poll round-trip latency in milliseconds.
pub static POLL_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "trafficctl_poll_latency_ms",
        "Controller poll round-trip latency in milliseconds",
        &["endpoint"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Responses dropped because a newer one had already been applied.
pub static STALE_DISCARD_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trafficctl_stale_discard_total",
        "Responses dropped for arriving out of sequence",
        &["endpoint"]
    )
    .unwrap()
});

/// Consecutive failed polls per endpoint (reset on success).
pub static CONSECUTIVE_FAILURES: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "trafficctl_consecutive_failures",
        "Consecutive failed polls per endpoint",
        &["endpoint"]
    )
    .unwrap()
});

/// Unix time at which each snapshot was last replaced.
pub static SNAPSHOT_APPLIED_SECONDS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "trafficctl_snapshot_applied_seconds",
        "Unix timestamp of the last applied snapshot per endpoint",
        &["endpoint"]
    )
    .unwrap()
});

/// Commands dispatched by action and outcome.
pub static DISPATCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "trafficctl_dispatch_total",
        "Control commands dispatched by action and outcome",
        &["action", "outcome"]
    )
    .unwrap()
});

/// Camera feeds in the latest aggregation cycle.
pub static CAMERA_FEEDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trafficctl_camera_feeds",
        "Camera feeds assembled in the latest cycle"
    )
    .unwrap()
});

/// Whether the camera aggregator is polling (1) or idle (0).
pub static CAMERA_POLLING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trafficctl_camera_polling",
        "Camera aggregator polling state (1=polling)"
    )
    .unwrap()
});

/// Controller running flag from the latest status.
pub static CONTROLLER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trafficctl_controller_running",
        "Controller running flag from the latest status (1=running)"
    )
    .unwrap()
});

/// Controller manual override flag from the latest status.
pub static CONTROLLER_MANUAL_OVERRIDE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trafficctl_controller_manual_override",
        "Controller manual override flag from the latest status (1=manual)"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a successful poll.
    pub fn poll_ok(endpoint: &str, latency_ms: f64) {
        POLL_TOTAL.with_label_values(&[endpoint, "ok"]).inc();
        POLL_LATENCY_MS
            .with_label_values(&[endpoint])
            .observe(latency_ms);
        CONSECUTIVE_FAILURES.with_label_values(&[endpoint]).set(0.0);
    }

    /// Record a failed poll.
    pub fn poll_failed(endpoint: &str) {
        POLL_TOTAL.with_label_values(&[endpoint, "error"]).inc();
    }

    /// Update the consecutive failure count for a snapshot endpoint.
    pub fn consecutive_failures(endpoint: &str, count: u32) {
        CONSECUTIVE_FAILURES
            .with_label_values(&[endpoint])
            .set(f64::from(count));
    }

    /// Record the time a snapshot was replaced.
    pub fn snapshot_applied(endpoint: &str, unix_seconds: i64) {
        SNAPSHOT_APPLIED_SECONDS
            .with_label_values(&[endpoint])
            .set(unix_seconds as f64);
    }

    /// Record a response dropped by the sequence gate.
    pub fn stale_discarded(endpoint: &str) {
        STALE_DISCARD_TOTAL.with_label_values(&[endpoint]).inc();
    }

    /// Record a dispatch outcome.
    pub fn dispatch(action: &str, outcome: &str) {
        DISPATCH_TOTAL.with_label_values(&[action, outcome]).inc();
    }

    /// Record the size of the latest camera set.
    pub fn camera_feeds(count: usize) {
        CAMERA_FEEDS.set(count as i64);
    }

    /// Record camera aggregator activity.
    pub fn camera_polling(active: bool) {
        CAMERA_POLLING.set(i64::from(active));
    }

    /// Record the controller mode from an applied status.
    pub fn controller_mode(running: bool, manual_override: bool) {
        CONTROLLER_RUNNING.set(i64::from(running));
        CONTROLLER_MANUAL_OVERRIDE.set(i64::from(manual_override));
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn encode_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_counters() {
        Metrics::poll_ok("test_status", 12.0);
        Metrics::poll_failed("test_status");
        Metrics::consecutive_failures("test_status", 3);
        assert!(POLL_TOTAL.with_label_values(&["test_status", "ok"]).get() >= 1.0);
        assert_eq!(
            CONSECUTIVE_FAILURES.with_label_values(&["test_status"]).get(),
            3.0
        );
    }

    #[test]
    fn test_encode_text_contains_registered_metric() {
        Metrics::stale_discarded("test_encode");
        let text = Metrics::encode_text().unwrap();
        assert!(text.contains("trafficctl_stale_discard_total"));
    }
}
