//! # Crane Credentials
//!
//! Startup bootstrap for the cluster agent: makes sure a valid agent private key
//! is stored in a Kubernetes Secret before the agent serves any traffic.
//!
//! ## Overview
//!
//! 1. **Namespace check** - the configured namespace must exist
//! 2. **Key lookup** - the `private.key` entry of the configured secret is read
//! 3. **Rotation** - a missing or expired key is replaced through server-side apply
//!
//! Configuration comes from `CRANE_*` environment variables and an optional YAML
//! file named in `CRANE_CONFIG_FILE`. Any failure exits non-zero.

use anyhow::{Context, Result};
use crane_credentials::config::AgentConfig;
use crane_credentials::runtime::{
    bootstrap, build_manager, initialize, kube_client, shutdown_token, Backends,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    initialize()?;

    let config = AgentConfig::from_env().context("Failed to load configuration")?;
    info!(
        namespace = %config.namespace,
        secret.name = %config.secret_name,
        field_manager = %config.field_manager,
        "Loaded configuration"
    );

    let backends = Backends::kube(kube_client().await?);
    let manager = build_manager(&config, &backends);
    let cancel = shutdown_token();

    bootstrap(&config, &manager, &cancel).await?;
    Ok(())
}
