//! # Runtime Module
//!
//! Process setup and wiring shared by the binaries: crypto provider, tracing,
//! metrics, cluster client, and the bootstrap sequence that resolves the agent key.

pub mod bootstrap;
pub mod initialization;

pub use bootstrap::*;
pub use initialization::*;
