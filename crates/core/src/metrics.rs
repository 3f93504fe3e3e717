//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Searches (count, duration, result sizes, dropped rows)
//! - Channel cache (syncs, cached channels, tuner collisions)
//! - Guide updates

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Search Metrics
// =============================================================================

/// Searches total by output kind.
pub static SEARCHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tvguide_searches_total", "Total program searches"),
        &["output"], // "typed", "raw"
    )
    .unwrap()
});

/// Search duration in seconds, store round trip included.
pub static SEARCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tvguide_search_duration_seconds",
            "Duration of program searches",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["output"],
    )
    .unwrap()
});

/// Rows returned per search.
pub static SEARCH_RESULTS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("tvguide_search_results", "Number of programs per search")
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]),
        &[],
    )
    .unwrap()
});

/// Program rows dropped because their channel could not be resolved.
pub static ROWS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tvguide_rows_dropped_total",
        "Program rows dropped due to an unknown parent channel",
    )
    .unwrap()
});

// =============================================================================
// Channel Cache Metrics
// =============================================================================

pub static CACHE_SYNCS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("tvguide_cache_syncs_total", "Total channel cache syncs").unwrap()
});

/// Tuner ids claimed by more than one channel, counted per sync.
pub static TUNER_COLLISIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "tvguide_tuner_collisions_total",
        "Tuner ids already claimed by another channel",
    )
    .unwrap()
});

pub static CHANNELS_CACHED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tvguide_channels_cached",
        "Channels held by the current cache snapshot",
    )
    .unwrap()
});

// =============================================================================
// Update Metrics
// =============================================================================

/// Guide updates by result.
pub static UPDATES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tvguide_updates_total", "Total guide updates"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Search
        Box::new(SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_DURATION.clone()),
        Box::new(SEARCH_RESULTS.clone()),
        Box::new(ROWS_DROPPED.clone()),
        // Cache
        Box::new(CACHE_SYNCS.clone()),
        Box::new(TUNER_COLLISIONS.clone()),
        Box::new(CHANNELS_CACHED.clone()),
        // Updates
        Box::new(UPDATES_TOTAL.clone()),
    ]
}
