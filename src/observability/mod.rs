//! # Observability
//!
//! Tracing subscriber setup and Prometheus metrics.
//!
//! ## Sub-modules
//!
//! - `metrics` - Credential and store metrics plus the global registry

pub mod metrics;

use anyhow::{anyhow, Result};

/// Install the global `tracing` subscriber
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {e}"))
}
