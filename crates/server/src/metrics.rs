//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the guide server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Guide size (collected dynamically)
//! - Core search, cache and update metrics (registered from `tvguide_core`)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tvguide_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tvguide_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tvguide_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Guide Metrics (collected dynamically)
// =============================================================================

/// Programs in the guide as of the last sync.
pub static GUIDE_PROGRAMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tvguide_programs", "Number of programs in the guide").unwrap()
});

/// Longest program duration as of the last sync.
pub static GUIDE_MAX_PROGRAM_LENGTH: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tvguide_max_program_length_seconds",
        "Longest program duration in the guide",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // Guide
    registry.register(Box::new(GUIDE_PROGRAMS.clone())).unwrap();
    registry
        .register(Box::new(GUIDE_MAX_PROGRAM_LENGTH.clone()))
        .unwrap();

    // Core metrics (searches, channel cache, updates)
    for metric in tvguide_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the guide gauges reflect the current snapshot.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let guide = state.guide();
    GUIDE_PROGRAMS.set(guide.num_programs() as i64);
    GUIDE_MAX_PROGRAM_LENGTH.set(guide.max_program_length());
}

static TUNER_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/channels/tuner/[^/]+$").unwrap());
static CHANNEL_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/channels/[^/]+$").unwrap());
static NUMERIC_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace channel names and ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    if TUNER_PATH.is_match(path) {
        return TUNER_PATH
            .replace(path, "/channels/tuner/{tuner_id}")
            .into_owned();
    }
    let result = CHANNEL_PATH.replace(path, "/channels/{name}");
    NUMERIC_SEGMENT
        .replace_all(&result, "/{id}$1")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_channel_name() {
        assert_eq!(
            normalize_path("/api/v1/channels/KQED"),
            "/api/v1/channels/{name}"
        );
    }

    #[test]
    fn test_normalize_path_tuner_id() {
        assert_eq!(
            normalize_path("/api/v1/channels/tuner/13"),
            "/api/v1/channels/tuner/{tuner_id}"
        );
    }

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/things/12345"), "/api/v1/things/{id}");
        assert_eq!(
            normalize_path("/api/v1/things/12/parts/3"),
            "/api/v1/things/{id}/parts/{id}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/channels"), "/api/v1/channels");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("tvguide_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        tvguide_core::metrics::CACHE_SYNCS.inc();
        tvguide_core::metrics::CHANNELS_CACHED.set(0);
        GUIDE_PROGRAMS.set(0);
        HTTP_REQUESTS_IN_FLIGHT.set(0);

        let output = encode_metrics();
        assert!(output.contains("tvguide_cache_syncs_total"));
        assert!(output.contains("tvguide_channels_cached"));
        assert!(output.contains("tvguide_programs"));
        assert!(output.contains("tvguide_http_requests_in_flight"));
    }
}
