//! # Bootstrap
//!
//! Builds the credential manager and synchronizer from configuration and
//! resolves the agent key once, bounded by the configured request timeout.

use super::initialization::Backends;
use crate::codec::{AeadSecretCodec, SecretCodec};
use crate::config::AgentConfig;
use crate::credential::{CredentialLifecycleManager, ResolvedCredentials};
use crate::error::CredentialError;
use crate::namespace::NamespaceValidator;
use crate::sync::SecretSynchronizer;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Credential manager wired to `backends` with the configured key lifetime and apply settings
pub fn build_manager(config: &AgentConfig, backends: &Backends) -> CredentialLifecycleManager {
    CredentialLifecycleManager::new(
        Arc::clone(&backends.store),
        NamespaceValidator::new(Arc::clone(&backends.namespaces)),
        Arc::new(AeadSecretCodec::new(config.key_lifetime_days)),
        config.apply_options(),
    )
}

/// Synchronizer encrypting with the resolved agent key
pub fn build_synchronizer(
    config: &AgentConfig,
    backends: &Backends,
    credentials: &ResolvedCredentials,
) -> Result<SecretSynchronizer> {
    let codec = AeadSecretCodec::new(config.key_lifetime_days)
        .with_key(credentials.key())
        .with_context(|| {
            format!(
                "Agent key in {}/{} cannot be used for encryption",
                credentials.namespace(),
                credentials.name()
            )
        })?;
    Ok(SecretSynchronizer::new(
        Arc::clone(&backends.store),
        Arc::new(codec) as Arc<dyn SecretCodec>,
        config.apply_options(),
    ))
}

/// Synchronizer for read-only auditing
///
/// The codec is left without a key, so building it never touches the agent key
/// secret and any attempt to apply through it fails with `EncryptionFailed`.
pub fn build_auditor(config: &AgentConfig, backends: &Backends) -> SecretSynchronizer {
    SecretSynchronizer::new(
        Arc::clone(&backends.store),
        Arc::new(AeadSecretCodec::new(config.key_lifetime_days)) as Arc<dyn SecretCodec>,
        config.apply_options(),
    )
}

/// List the value keys of secret `config.namespace/name` without resolving the agent key
pub async fn audit_keys(
    config: &AgentConfig,
    backends: &Backends,
    cancel: &CancellationToken,
    name: &str,
) -> Result<Vec<String>> {
    let auditor = build_auditor(config, backends);
    with_deadline(cancel, config.request_timeout(), |deadline| async move {
        auditor.list(&deadline, &config.namespace, name).await
    })
    .await
    .with_context(|| format!("Failed to list keys of '{}/{}'", config.namespace, name))
}

/// Run `operation` with a child of `cancel` that also fires after `timeout`
pub async fn with_deadline<F, Fut, T>(
    cancel: &CancellationToken,
    timeout: Duration,
    operation: F,
) -> Result<T, CredentialError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, CredentialError>>,
{
    let deadline = cancel.child_token();
    let timer = tokio::spawn({
        let deadline = deadline.clone();
        async move {
            tokio::time::sleep(timeout).await;
            warn!("Operation exceeded {}s, cancelling", timeout.as_secs());
            deadline.cancel();
        }
    });

    let result = operation(deadline).await;
    timer.abort();
    result
}

/// Resolve the agent key named by `config`
///
/// Any error is fatal to the caller; there is no local fallback key.
pub async fn bootstrap(
    config: &AgentConfig,
    manager: &CredentialLifecycleManager,
    cancel: &CancellationToken,
) -> Result<ResolvedCredentials> {
    let credentials = with_deadline(cancel, config.request_timeout(), |deadline| async move {
        manager
            .ensure_valid_key(&deadline, &config.namespace, &config.secret_name)
            .await
    })
    .await
    .with_context(|| {
        format!(
            "Failed to resolve agent key from secret {}/{}",
            config.namespace, config.secret_name
        )
    })?;

    info!(
        namespace = credentials.namespace(),
        secret.name = credentials.name(),
        resolution = credentials.resolution().as_str(),
        version = credentials.version(),
        "Agent key ready"
    );
    Ok(credentials)
}
