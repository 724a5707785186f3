//! # Metrics
//!
//! Prometheus metrics for monitoring the controller and the admission webhook.
//!
//! ## Metrics Exposed
//!
//! - `sanjagh_reconciliations_total` - Total number of reconciliations
//! - `sanjagh_reconciliation_errors_total` - Total number of reconciliation errors
//! - `sanjagh_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `sanjagh_requeues_total` - Requeues by reason (`immediate`, `delayed`, `error-backoff`)
//! - `sanjagh_phase_transitions_total` - Status phase writes by target phase
//! - `sanjagh_artifact_operations_total` - Deployment writes by operation
//! - `sanjagh_admission_reviews_total` - Admission reviews by kind and decision
//! - `sanjagh_admission_review_duration_seconds` - Duration of admission reviews

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sanjagh_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sanjagh_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "sanjagh_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sanjagh_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static PHASE_TRANSITIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sanjagh_phase_transitions_total",
            "Total number of status phase writes by target phase",
        ),
        &["phase"],
    )
    .expect("Failed to create PHASE_TRANSITIONS_TOTAL metric - this should never happen")
});

static ARTIFACT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sanjagh_artifact_operations_total",
            "Total number of Deployment writes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create ARTIFACT_OPERATIONS_TOTAL metric - this should never happen")
});

static ADMISSION_REVIEWS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "sanjagh_admission_reviews_total",
            "Total number of admission reviews by kind and decision",
        ),
        &["kind", "decision"],
    )
    .expect("Failed to create ADMISSION_REVIEWS_TOTAL metric - this should never happen")
});

static ADMISSION_REVIEW_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "sanjagh_admission_review_duration_seconds",
            "Duration of admission reviews in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
    )
    .expect("Failed to create ADMISSION_REVIEW_DURATION metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register all metrics with the process-wide registry.
///
/// Fails if called twice in the same process.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PHASE_TRANSITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_REVIEWS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ADMISSION_REVIEW_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_phase_transitions(phase: &str) {
    PHASE_TRANSITIONS_TOTAL.with_label_values(&[phase]).inc();
}

pub fn increment_artifact_operations(operation: &str) {
    ARTIFACT_OPERATIONS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

/// Record a finished admission review
pub fn record_admission_review(kind: &str, decision: &str, duration: f64) {
    ADMISSION_REVIEWS_TOTAL
        .with_label_values(&[kind, decision])
        .inc();
    ADMISSION_REVIEW_DURATION.observe(duration);
}
