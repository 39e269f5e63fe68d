//! # Metrics Module
//!
//! Prometheus metrics for the credential manager and the secret synchronizer.
//!
//! ## Sub-modules
//!
//! - `registry` - Metrics registry setup, registration and text exposition
//! - `credential_metrics` - Key resolutions, credential errors, applies and store latency

pub mod credential_metrics;
pub mod registry;

pub use credential_metrics::*;
pub use registry::*;
