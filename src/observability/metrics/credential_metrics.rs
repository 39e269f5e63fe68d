//! # Credential Metrics
//!
//! Metrics for key resolution, credential failures, secret applies and
//! latency of calls against the secret store.

use crate::observability::metrics::registry::REGISTRY;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec};
use std::sync::LazyLock;

static KEY_RESOLUTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "crane_key_resolutions_total",
            "Total number of successful agent key resolutions by outcome (reused, created, rotated)",
        ),
        &["outcome"],
    )
    .expect("Failed to create KEY_RESOLUTIONS_TOTAL metric - this should never happen")
});

static CREDENTIAL_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "crane_credential_errors_total",
            "Total number of credential manager and synchronizer errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create CREDENTIAL_ERRORS_TOTAL metric - this should never happen")
});

static SECRET_APPLIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "crane_secret_applies_total",
        "Total number of successful server-side applies of secrets",
    )
    .expect("Failed to create SECRET_APPLIES_TOTAL metric - this should never happen")
});

static STORE_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "crane_store_operation_duration_seconds",
            "Duration of secret store operations in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["operation"],
    )
    .expect("Failed to create STORE_OPERATION_DURATION metric - this should never happen")
});

pub(crate) fn register_credential_metrics() -> Result<()> {
    REGISTRY.register(Box::new(KEY_RESOLUTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CREDENTIAL_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRET_APPLIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_OPERATION_DURATION.clone()))?;
    Ok(())
}

// Public functions for credential metrics

pub fn increment_key_resolutions(outcome: &str) {
    KEY_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_credential_errors(kind: &str) {
    CREDENTIAL_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_secret_applies() {
    SECRET_APPLIES_TOTAL.inc();
}

pub fn observe_store_operation(operation: &str, duration: f64) {
    STORE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}
