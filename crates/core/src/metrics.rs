//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Routing (order list writes)
//! - Supervision (job outcomes and durations)
//! - Entity id lookups (cache hits, store resolutions, fallbacks)
//! - Sessions (currently held in the store)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Routing
// =============================================================================

/// Order list files rewritten, by marketplace.
pub static ORDERLIST_WRITES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "orderflow_orderlist_writes_total",
            "Order list files rewritten because their content changed",
        ),
        &["marketplace"],
    )
    .unwrap()
});

// =============================================================================
// Supervision
// =============================================================================

/// Finished jobs by marketplace and outcome.
pub static JOBS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("orderflow_jobs_total", "Automation jobs by outcome"),
        &["marketplace", "outcome"], // "success", "failed", "timed_out", "skipped"
    )
    .unwrap()
});

/// Job wall-clock duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "orderflow_job_duration_seconds",
            "Wall-clock duration of automation jobs",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1200.0]),
        &["marketplace"],
    )
    .unwrap()
});

// =============================================================================
// Entity id lookups
// =============================================================================

/// Entity id lookups by result.
pub static ENTITY_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "orderflow_entity_lookups_total",
            "Entity id lookups by result",
        ),
        &["result"], // "hit", "resolved", "fallback"
    )
    .unwrap()
});

// =============================================================================
// Sessions
// =============================================================================

/// Sessions currently held in the store.
pub static SESSIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "orderflow_sessions_active",
        "Execution sessions currently held in memory",
    )
    .unwrap()
});

/// Collectors defined in this module, for registration by the server.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ORDERLIST_WRITES.clone()),
        Box::new(JOBS_TOTAL.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(ENTITY_LOOKUPS.clone()),
        Box::new(SESSIONS_ACTIVE.clone()),
    ]
}
