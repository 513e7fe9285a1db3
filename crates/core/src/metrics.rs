//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Acquisition attempts (outcomes, duration, challenge results, partitions)
//! - Session establishment
//! - Scheduler (deadline fire lateness)

use once_cell::sync::Lazy;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Acquisition attempts
// =============================================================================

/// Acquisition attempts total by outcome.
pub static ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "curtaincall_attempts_total",
            "Total acquisition attempts by outcome",
        ),
        &["outcome"], // "succeeded", a failure tag, or "aborted"
    )
    .unwrap()
});

/// Attempt duration in seconds, by terminal state.
pub static ATTEMPT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "curtaincall_attempt_duration_seconds",
            "Duration of an acquisition attempt",
        )
        .buckets(vec![1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0]),
        &["state"],
    )
    .unwrap()
});

/// Challenge solve cycles by result.
pub static CHALLENGE_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "curtaincall_challenge_attempts_total",
            "Total challenge solve cycles",
        ),
        &["result"], // "passed", "rejected", "solver_error"
    )
    .unwrap()
});

/// Partitions selected and probed for units.
pub static PARTITIONS_PROBED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "curtaincall_partitions_probed_total",
        "Total partitions probed during allocation search",
    )
    .unwrap()
});

// =============================================================================
// Session
// =============================================================================

/// Session establishment by path.
pub static SESSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("curtaincall_sessions_total", "Total session establishments"),
        &["result"], // "reused", "login", "failed"
    )
    .unwrap()
});

// =============================================================================
// Scheduler
// =============================================================================

/// How late each phase fired relative to its deadline.
pub static FIRE_LATENESS: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "curtaincall_fire_lateness_seconds",
            "Delay between a deadline and its phase firing",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
        &["phase"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Attempts
        Box::new(ATTEMPTS.clone()),
        Box::new(ATTEMPT_DURATION.clone()),
        Box::new(CHALLENGE_ATTEMPTS.clone()),
        Box::new(PARTITIONS_PROBED.clone()),
        // Session
        Box::new(SESSIONS.clone()),
        // Scheduler
        Box::new(FIRE_LATENESS.clone()),
    ]
}

/// Build a registry holding every core metric.
pub fn registry() -> Result<Registry, prometheus::Error> {
    let registry = Registry::new();
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(registry)
}

/// Encode a registry as Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
