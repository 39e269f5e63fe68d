//! # cranectl
//!
//! Command-line interface for the agent key and encrypted secret bundles.
//!
//! ## Usage
//!
//! ```bash
//! # Ensure the agent key exists (creating or rotating it) and print the outcome
//! cranectl init --namespace crane-system
//!
//! # List the value keys stored in a secret
//! cranectl keys --name db-credentials
//!
//! # Encrypt a YAML map of plaintext values and apply it as a secret
//! cranectl apply --name db-credentials --from-file secrets.yaml
//!
//! # Try init or apply against an in-memory store (keys is rejected)
//! cranectl --dry-run apply --name db-credentials --from-file secrets.yaml
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crane_credentials::config::AgentConfig;
use crane_credentials::observability::metrics::gather_metrics;
use crane_credentials::runtime::{
    audit_keys, bootstrap, build_manager, build_synchronizer, initialize, kube_client,
    shutdown_token, with_deadline, Backends,
};
use crane_credentials::store::InMemorySecretStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Crane credentials CLI
#[derive(Parser)]
#[command(name = "cranectl")]
#[command(about = "Manage the crane agent key and encrypted secret bundles", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to CRANE_NAMESPACE or crane-system)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Run against a fresh, empty in-memory store instead of the cluster
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print Prometheus metrics collected during the command
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure a valid agent key is stored, creating or rotating it if needed
    Init {
        /// Name of the agent key secret (defaults to CRANE_SECRET_NAME or crane-agent-key)
        #[arg(long)]
        secret_name: Option<String>,
    },
    /// List the value keys of a secret (read-only; not available with --dry-run)
    Keys {
        /// Name of the secret
        #[arg(long)]
        name: String,
    },
    /// Encrypt a YAML map of plaintext values and apply it as a secret
    Apply {
        /// Name of the secret
        #[arg(long)]
        name: String,

        /// YAML file containing a flat map of key names to plaintext values
        #[arg(long)]
        from_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    reject_dry_run_listing(&cli)?;

    initialize()?;

    let mut config = AgentConfig::from_env().context("Failed to load configuration")?;
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }

    let backends = if cli.dry_run {
        println!("Dry run: using an in-memory secret store");
        Backends::in_memory(InMemorySecretStore::with_namespaces([config.namespace.clone()]))
    } else {
        Backends::kube(kube_client().await?)
    };
    let cancel = shutdown_token();

    match cli.command {
        Commands::Init { secret_name } => {
            if let Some(secret_name) = secret_name {
                config.secret_name = secret_name;
            }
            init_command(&config, &backends, &cancel).await?;
        }
        Commands::Keys { name } => keys_command(&config, &backends, &cancel, &name).await?,
        Commands::Apply { name, from_file } => {
            apply_command(&config, &backends, &cancel, &name, &from_file).await?;
        }
    }

    if cli.print_metrics {
        println!("\n{}", gather_metrics()?);
    }
    Ok(())
}

/// Resolve the agent key and report how it was obtained
async fn init_command(
    config: &AgentConfig,
    backends: &Backends,
    cancel: &CancellationToken,
) -> Result<()> {
    println!(
        "Ensuring agent key in secret '{}/{}'...",
        config.namespace, config.secret_name
    );

    let manager = build_manager(config, backends);
    let credentials = bootstrap(config, &manager, cancel).await?;

    println!("✅ Agent key {}", credentials.resolution());
    println!(
        "   Secret: {}/{}",
        credentials.namespace(),
        credentials.name()
    );
    println!("   Resource version: {}", credentials.version());
    Ok(())
}

/// Print the value keys stored in a secret
///
/// Read-only: the agent key is never resolved, created or rotated here.
async fn keys_command(
    config: &AgentConfig,
    backends: &Backends,
    cancel: &CancellationToken,
    name: &str,
) -> Result<()> {
    let keys = audit_keys(config, backends, cancel, name).await?;

    if keys.is_empty() {
        println!("No keys found in secret '{}/{}'.", config.namespace, name);
        return Ok(());
    }

    println!("\n{:<40}", "KEY");
    println!("{}", "-".repeat(40));
    for key in keys {
        println!("{key:<40}");
    }
    Ok(())
}

/// Encrypt a plaintext bundle with the agent key and apply it
async fn apply_command(
    config: &AgentConfig,
    backends: &Backends,
    cancel: &CancellationToken,
    name: &str,
    from_file: &Path,
) -> Result<()> {
    let plaintext = read_bundle(from_file)?;

    let manager = build_manager(config, backends);
    let credentials = bootstrap(config, &manager, cancel).await?;
    let synchronizer = build_synchronizer(config, backends, &credentials)?;

    println!(
        "Applying {} key(s) to secret '{}/{}'...",
        plaintext.len(),
        config.namespace,
        name
    );

    let version = with_deadline(cancel, config.request_timeout(), |deadline| {
        let synchronizer = &synchronizer;
        let plaintext = &plaintext;
        async move {
            synchronizer
                .apply(&deadline, &config.namespace, name, plaintext)
                .await
        }
    })
    .await
    .with_context(|| format!("Failed to apply secret '{}/{}'", config.namespace, name))?;

    println!("✅ Secret applied");
    println!("   Resource: {}/{}", config.namespace, name);
    println!("   Resource version: {version}");
    if plaintext.is_empty() {
        println!("   (empty bundle, not recorded as applied)");
    }
    Ok(())
}

/// A dry run starts from an empty store, so listing could only ever print nothing
fn reject_dry_run_listing(cli: &Cli) -> Result<()> {
    if cli.dry_run && matches!(cli.command, Commands::Keys { .. }) {
        return Err(anyhow!(
            "--dry-run uses a fresh in-memory store; `keys` would always be empty"
        ));
    }
    Ok(())
}

/// Read a flat YAML map of key names to plaintext values
fn read_bundle(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_yaml::from_str(&raw).with_context(|| {
        format!(
            "Failed to parse {} as a map of key names to string values",
            path.display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_dry_run_keys_is_rejected() {
        let cli =
            Cli::try_parse_from(["cranectl", "--dry-run", "keys", "--name", "bundle"]).unwrap();
        let err = reject_dry_run_listing(&cli).unwrap_err();
        assert!(err.to_string().contains("--dry-run"));

        let cli = Cli::try_parse_from(["cranectl", "keys", "--name", "bundle"]).unwrap();
        assert!(reject_dry_run_listing(&cli).is_ok());

        let cli = Cli::try_parse_from(["cranectl", "--dry-run", "init"]).unwrap();
        assert!(reject_dry_run_listing(&cli).is_ok());
    }

    #[test]
    fn test_bad_arguments_fail_at_parse_time() {
        assert!(Cli::try_parse_from(["cranectl", "keys"]).is_err());
        assert!(Cli::try_parse_from(["cranectl", "--bogus", "init"]).is_err());
    }
}
