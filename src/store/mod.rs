//! # Secret Store
//!
//! Thin facade over the control plane's secret API.
//!
//! ## Module Structure
//!
//! - `cluster.rs` - Kubernetes implementation (`Api<Secret>`, `Api<Namespace>`, server-side apply)
//! - `memory.rs` - In-memory implementation used by tests and dry runs
//!
//! Every operation is parameterized by namespace. "Not found" is a closed
//! [`SecretLookup::NotFound`] variant rather than an error, so callers branch on
//! structure instead of inspecting status codes.

mod cluster;
mod memory;

pub use self::cluster::KubeSecretStore;
pub use self::memory::InMemorySecretStore;

use crate::error::CredentialError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Secret payload: file-like key names mapped to opaque bytes
pub type SecretValues = BTreeMap<String, Vec<u8>>;

/// A secret as observed in the store
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub namespace: String,
    pub name: String,
    pub values: SecretValues,
    /// Opaque version token assigned by the store on every write
    pub version: String,
}

impl SecretRecord {
    /// Names of all value keys in this record, sorted
    pub fn value_keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Raw value stored under `key`
    pub fn value(&self, key: &str) -> Option<&[u8]> {
        self.values.get(key).map(Vec::as_slice)
    }
}

// Values are secret material, only key names are printed
impl std::fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRecord")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("version", &self.version)
            .finish()
    }
}

/// Result of looking up a secret by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLookup {
    Found(SecretRecord),
    NotFound,
}

/// Server-side apply settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Identity the write is attributed to
    pub field_manager: String,
    /// Take over fields owned by other managers instead of failing
    pub force: bool,
}

impl ApplyOptions {
    pub fn new(field_manager: impl Into<String>, force: bool) -> Self {
        Self {
            field_manager: field_manager.into(),
            force,
        }
    }
}

/// Failures reported by a [`SecretStore`] or [`NamespaceLister`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error returned by the Kubernetes client
    #[error("Kubernetes API error: {0}")]
    Api(#[from] ::kube::Error),
    /// Store could not be reached
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
    /// Apply touched fields owned by another field manager without force
    #[error("field ownership conflict: {0}")]
    Conflict(String),
    /// API returned an object missing required metadata
    #[error("malformed object returned by the API: {0}")]
    Malformed(String),
}

/// Namespaced secret access
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch one secret by name
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError>;

    /// List every secret visible in the namespace
    async fn list(&self, namespace: &str) -> Result<Vec<SecretRecord>, StoreError>;

    /// Create or merge a secret with server-side apply semantics, returning the new version
    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        values: &SecretValues,
        options: &ApplyOptions,
    ) -> Result<String, StoreError>;
}

/// Cluster namespace listing
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    /// Names of all namespaces known to the control plane
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError>;
}

/// Race a store call against the caller's cancellation token
///
/// The in-flight future is dropped as soon as the token fires, which aborts the
/// underlying HTTP request.
pub async fn with_cancellation<F, T>(
    cancel: &CancellationToken,
    operation: &str,
    call: F,
) -> Result<T, CredentialError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CredentialError::cancelled(operation)),
        output = call => Ok(output),
    }
}
