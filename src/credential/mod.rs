//! # Credential Lifecycle
//!
//! Resolves the agent private key before the agent starts serving.
//!
//! ## Module Structure
//!
//! - `validation.rs` - Namespace and secret name validation
//! - `resolved.rs` - [`ResolvedCredentials`] and [`KeyResolution`]
//!
//! ## Flow
//!
//! ```text
//! Start -> NamespaceChecked -> Found   -> Valid   -> Done (Reused)
//!                                      -> Expired -> Generated -> Done (Rotated)
//!                           -> Missing -> Generated -> Done (Created)
//! ```
//!
//! There is no retry loop and no lock: two replicas starting at once may both
//! generate and apply a key, and the last apply wins. Every write logs the
//! version it produced so a lost race shows up in the logs.

mod resolved;
mod validation;

pub use resolved::{KeyResolution, ResolvedCredentials};

use crate::codec::SecretCodec;
use crate::constants::CREDENTIAL_KEY_NAME;
use crate::error::CredentialError;
use crate::namespace::NamespaceValidator;
use crate::observability::metrics;
use crate::store::{with_cancellation, ApplyOptions, SecretLookup, SecretRecord, SecretStore};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

pub(crate) use validation::{validate_namespace, validate_secret_name};

/// Ensures a valid agent key exists in the cluster and returns it
#[derive(Clone)]
pub struct CredentialLifecycleManager {
    store: Arc<dyn SecretStore>,
    namespaces: NamespaceValidator,
    codec: Arc<dyn SecretCodec>,
    apply_options: ApplyOptions,
}

impl std::fmt::Debug for CredentialLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialLifecycleManager")
            .field("apply_options", &self.apply_options)
            .finish_non_exhaustive()
    }
}

impl CredentialLifecycleManager {
    pub fn new(
        store: Arc<dyn SecretStore>,
        namespaces: NamespaceValidator,
        codec: Arc<dyn SecretCodec>,
        apply_options: ApplyOptions,
    ) -> Self {
        Self {
            store,
            namespaces,
            codec,
            apply_options,
        }
    }

    /// Return a valid agent key for `namespace/name`, creating or rotating it if needed
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for empty or malformed names
    /// - `NamespaceNotFound` when the namespace is missing (nothing is written)
    /// - `ClusterUnreachable` when namespaces cannot be listed
    /// - `StoreReadFailed` when the secret read fails for a reason other than "not found"
    /// - `EmptyCredentialRecord` when the secret holds no usable key (nothing is written)
    /// - `InvalidCredential` when the stored key cannot be judged by the codec
    /// - `KeyGenerationFailed` / `StoreWriteFailed` when a new key cannot be produced or stored
    /// - `Cancelled` when `cancel` fires during a cluster call
    pub async fn ensure_valid_key(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<ResolvedCredentials, CredentialError> {
        let span = info_span!(
            "credential.ensure_valid_key",
            namespace = namespace,
            secret.name = name
        );
        let result = self.resolve(cancel, namespace, name).instrument(span).await;

        match &result {
            Ok(resolved) => metrics::increment_key_resolutions(resolved.resolution().as_str()),
            Err(e) => {
                metrics::increment_credential_errors(e.kind().as_str());
                warn!(
                    namespace = namespace,
                    secret.name = name,
                    error.kind = e.kind().as_str(),
                    "Agent key resolution failed: {}",
                    e
                );
            }
        }
        result
    }

    async fn resolve(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<ResolvedCredentials, CredentialError> {
        validate_namespace(namespace)?;
        validate_secret_name(name)?;

        if !self.namespaces.exists(cancel, namespace).await? {
            return Err(CredentialError::NamespaceNotFound {
                namespace: namespace.to_string(),
            });
        }

        let lookup = with_cancellation(
            cancel,
            "reading agent key secret",
            self.store.get(namespace, name),
        )
        .await?
        .map_err(|source| CredentialError::StoreReadFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

        let record = match lookup {
            SecretLookup::NotFound => {
                info!(
                    namespace = namespace,
                    secret.name = name,
                    "Stored secret {}/{} not found, generating a new agent key",
                    namespace,
                    name
                );
                return self
                    .generate_and_store(cancel, namespace, name, KeyResolution::Created)
                    .await;
            }
            SecretLookup::Found(record) => record,
        };

        let key = stored_key(&record)?;
        let expired = self
            .codec
            .is_expired(&key)
            .map_err(|source| CredentialError::InvalidCredential {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;

        if expired {
            info!(
                namespace = namespace,
                secret.name = name,
                version = %record.version,
                "Stored secret {}/{} was expired (resourceVersion: {}), so renewing",
                namespace,
                name,
                record.version
            );
            return self
                .generate_and_store(cancel, namespace, name, KeyResolution::Rotated)
                .await;
        }

        debug!(
            namespace = namespace,
            secret.name = name,
            version = %record.version,
            "Reusing stored agent key"
        );
        Ok(ResolvedCredentials::new(
            namespace,
            name,
            key,
            KeyResolution::Reused,
            record.version,
        ))
    }

    async fn generate_and_store(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
        resolution: KeyResolution,
    ) -> Result<ResolvedCredentials, CredentialError> {
        let key = Zeroizing::new(self.codec.generate_key().map_err(|source| {
            CredentialError::KeyGenerationFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            }
        })?);

        let values = BTreeMap::from([(CREDENTIAL_KEY_NAME.to_string(), key.as_bytes().to_vec())]);
        let version = with_cancellation(
            cancel,
            "applying agent key secret",
            self.store.apply(namespace, name, &values, &self.apply_options),
        )
        .await?
        .map_err(|source| CredentialError::StoreWriteFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

        metrics::increment_secret_applies();
        info!(
            namespace = namespace,
            secret.name = name,
            version = %version,
            resolution = resolution.as_str(),
            field_manager = %self.apply_options.field_manager,
            "Stored agent key in secret {}/{} (resourceVersion: {})",
            namespace,
            name,
            version
        );

        Ok(ResolvedCredentials::new(namespace, name, key, resolution, version))
    }
}

/// Extract the agent key from a stored record
///
/// A missing, empty or non-UTF-8 entry is an integrity problem the manager does
/// not paper over by regenerating.
fn stored_key(record: &SecretRecord) -> Result<Zeroizing<String>, CredentialError> {
    let empty = || CredentialError::EmptyCredentialRecord {
        namespace: record.namespace.clone(),
        name: record.name.clone(),
        version: record.version.clone(),
    };

    let raw = record
        .value(CREDENTIAL_KEY_NAME)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(empty)?;
    let key = std::str::from_utf8(raw).map_err(|_invalid| empty())?;
    Ok(Zeroizing::new(key.to_string()))
}
