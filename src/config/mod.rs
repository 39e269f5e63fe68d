//! # Agent Configuration
//!
//! Configuration loaded from environment variables, optionally overlaid by a
//! YAML file named in `CRANE_CONFIG_FILE`.
//!
//! All settings have sensible defaults. The loaded value is never mutated
//! afterwards; resolved credentials travel separately as
//! [`crate::ResolvedCredentials`].

mod agent;

pub use agent::{AgentConfig, ConfigError};
