//! # Secret Synchronization
//!
//! Pushes named secret bundles into the store with server-side apply and
//! audits what is stored.
//!
//! Plaintext values are encrypted through the [`SecretCodec`] before they
//! leave the process. Names applied with non-empty content are remembered in
//! an [`AppliedSecretRegistry`] for the lifetime of the process.

use crate::codec::SecretCodec;
use crate::credential::{validate_namespace, validate_secret_name};
use crate::error::CredentialError;
use crate::observability::metrics;
use crate::store::{with_cancellation, ApplyOptions, SecretLookup, SecretStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

/// Process-local set of secret names applied with non-empty content
#[derive(Debug, Default)]
pub struct AppliedSecretRegistry {
    names: Mutex<BTreeSet<String>>,
}

impl AppliedSecretRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn names(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.names.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember `name`; returns `true` the first time it is seen
    pub fn record(&self, name: &str) -> bool {
        self.names().insert(name.to_string())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }

    /// Sorted copy of every recorded name
    pub fn snapshot(&self) -> Vec<String> {
        self.names().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

/// Applies and lists encrypted secret bundles
pub struct SecretSynchronizer {
    store: Arc<dyn SecretStore>,
    codec: Arc<dyn SecretCodec>,
    apply_options: ApplyOptions,
    registry: AppliedSecretRegistry,
}

impl std::fmt::Debug for SecretSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSynchronizer")
            .field("apply_options", &self.apply_options)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl SecretSynchronizer {
    pub fn new(
        store: Arc<dyn SecretStore>,
        codec: Arc<dyn SecretCodec>,
        apply_options: ApplyOptions,
    ) -> Self {
        Self {
            store,
            codec,
            apply_options,
            registry: AppliedSecretRegistry::new(),
        }
    }

    /// Encrypt `plaintext` and apply it as secret `namespace/name`, returning the new version
    ///
    /// Applying the same input twice leaves the stored fields unchanged; only the
    /// version moves. An empty map is applied but never recorded in the registry.
    pub async fn apply(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
        plaintext: &BTreeMap<String, String>,
    ) -> Result<String, CredentialError> {
        let span = info_span!(
            "sync.apply",
            namespace = namespace,
            secret.name = name,
            keys = plaintext.len()
        );
        let result = self
            .apply_encrypted(cancel, namespace, name, plaintext)
            .instrument(span)
            .await;

        count_error(&result);
        result
    }

    async fn apply_encrypted(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
        plaintext: &BTreeMap<String, String>,
    ) -> Result<String, CredentialError> {
        validate_namespace(namespace)?;
        validate_secret_name(name)?;

        let values = self
            .codec
            .encrypt(plaintext)
            .map_err(|source| CredentialError::EncryptionFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;

        let version = with_cancellation(
            cancel,
            "applying secret",
            self.store.apply(namespace, name, &values, &self.apply_options),
        )
        .await?
        .map_err(|source| CredentialError::StoreWriteFailed {
            namespace: namespace.to_string(),
            name: name.to_string(),
            source,
        })?;

        metrics::increment_secret_applies();
        if !plaintext.is_empty() && self.registry.record(name) {
            debug!(secret.name = name, "Registered applied secret");
        }
        info!(
            namespace = namespace,
            secret.name = name,
            version = %version,
            "Applied secret {}/{} (resourceVersion: {})",
            namespace,
            name,
            version
        );
        Ok(version)
    }

    /// Value-key names of secret `namespace/name`, sorted; empty when it does not exist
    pub async fn list(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>, CredentialError> {
        let span = info_span!("sync.list", namespace = namespace, secret.name = name);
        let result = self
            .list_keys(cancel, namespace, name)
            .instrument(span)
            .await;

        count_error(&result);
        result
    }

    async fn list_keys(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<String>, CredentialError> {
        validate_namespace(namespace)?;

        let records = with_cancellation(cancel, "listing secrets", self.store.list(namespace))
            .await?
            .map_err(|source| CredentialError::StoreReadFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;

        let keys = records
            .into_iter()
            .find(|record| record.name == name)
            .map(|record| record.value_keys())
            .unwrap_or_default();
        debug!(count = keys.len(), "Listed secret keys");
        Ok(keys)
    }

    /// Fetch secret `namespace/name` and decrypt its values; `None` when it does not exist
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, CredentialError> {
        let span = info_span!("sync.read", namespace = namespace, secret.name = name);
        let result = self
            .read_decrypted(cancel, namespace, name)
            .instrument(span)
            .await;

        count_error(&result);
        result
    }

    async fn read_decrypted(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
        name: &str,
    ) -> Result<Option<BTreeMap<String, String>>, CredentialError> {
        validate_namespace(namespace)?;
        validate_secret_name(name)?;

        let lookup = with_cancellation(cancel, "reading secret", self.store.get(namespace, name))
            .await?
            .map_err(|source| CredentialError::StoreReadFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;

        let SecretLookup::Found(record) = lookup else {
            debug!("Secret not found");
            return Ok(None);
        };

        let plaintext = self
            .codec
            .decrypt(&record.values)
            .map_err(|source| CredentialError::DecryptionFailed {
                namespace: namespace.to_string(),
                name: name.to_string(),
                source,
            })?;
        Ok(Some(plaintext))
    }

    /// Sorted names of every secret applied with non-empty content by this process
    pub fn applied_secrets(&self) -> Vec<String> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &AppliedSecretRegistry {
        &self.registry
    }
}

fn count_error<T>(result: &Result<T, CredentialError>) {
    if let Err(e) = result {
        metrics::increment_credential_errors(e.kind().as_str());
    }
}
