//! # Initialization
//!
//! Process initialization: rustls setup, tracing, metrics, and the backends the
//! credential manager talks to.

use crate::constants;
use crate::observability;
use crate::store::{InMemorySecretStore, KubeSecretStore, NamespaceLister, SecretStore};
use anyhow::{anyhow, Context, Result};
use kube::Client;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Secret store and namespace lister used by the manager and the synchronizer
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn SecretStore>,
    pub namespaces: Arc<dyn NamespaceLister>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

impl Backends {
    /// Backends talking to the cluster the client is configured for
    pub fn kube(client: Client) -> Self {
        let store = Arc::new(KubeSecretStore::new(client));
        Self {
            store: Arc::clone(&store) as Arc<dyn SecretStore>,
            namespaces: store,
        }
    }

    /// Process-local backends
    pub fn in_memory(store: InMemorySecretStore) -> Self {
        Self {
            store: Arc::new(store.clone()),
            namespaces: Arc::new(store),
        }
    }
}

/// Initialize process-wide state
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
pub fn initialize() -> Result<()> {
    // Configure rustls crypto provider FIRST, before any other operations
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow!("Failed to install rustls crypto provider"))?;

    observability::init_tracing(constants::DEFAULT_LOG_FILTER)?;

    info!(
        "Starting crane credentials v{}",
        env!("CARGO_PKG_VERSION")
    );

    observability::metrics::register_metrics()?;
    Ok(())
}

/// Create a Kubernetes client from the ambient kubeconfig or in-cluster config
pub async fn kube_client() -> Result<Client> {
    Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")
}

/// Token cancelled on Ctrl+C
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, cancelling in-flight operations");
        trigger.cancel();
    });
    token
}
