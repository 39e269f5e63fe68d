//! # Credential Error Types
//!
//! Error taxonomy for the credential lifecycle manager and the secret synchronizer,
//! with classification of transient vs permanent failures.
//!
//! Every variant carries the namespace/name it was raised for and, where one exists,
//! the underlying cause. Nothing in this crate retries on its own; callers decide
//! what to do with a transient failure.

use crate::codec::CodecError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors surfaced by [`crate::CredentialLifecycleManager`] and [`crate::SecretSynchronizer`]
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Empty or malformed namespace / secret name
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Listing or reading from the control plane failed at the transport/API level
    #[error("cluster unreachable while {operation}: {source}")]
    ClusterUnreachable {
        operation: String,
        #[source]
        source: StoreError,
    },

    /// Target namespace does not exist on the cluster
    #[error("namespace not found on cluster: {namespace}")]
    NamespaceNotFound { namespace: String },

    /// Secret exists but holds no usable credential entry
    #[error("stored secret {namespace}/{name} was empty (resourceVersion: {version})")]
    EmptyCredentialRecord {
        namespace: String,
        name: String,
        version: String,
    },

    /// Stored credential could not be parsed by the codec
    #[error("handling stored secret {namespace}/{name} failed: {source}")]
    InvalidCredential {
        namespace: String,
        name: String,
        #[source]
        source: CodecError,
    },

    /// Codec could not produce new key material
    #[error("generating a key for {namespace}/{name} failed: {source}")]
    KeyGenerationFailed {
        namespace: String,
        name: String,
        #[source]
        source: CodecError,
    },

    /// Reading a secret failed for a reason other than "not found"
    #[error("stored secret {namespace}/{name} could not be read: {source}")]
    StoreReadFailed {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// Applying a secret failed
    #[error("applying secret {namespace}/{name} failed: {source}")]
    StoreWriteFailed {
        namespace: String,
        name: String,
        #[source]
        source: StoreError,
    },

    /// Plaintext values could not be encrypted before apply
    #[error("encrypting values for secret {namespace}/{name} failed: {source}")]
    EncryptionFailed {
        namespace: String,
        name: String,
        #[source]
        source: CodecError,
    },

    /// Stored values could not be decrypted after read
    #[error("decrypting values of secret {namespace}/{name} failed: {source}")]
    DecryptionFailed {
        namespace: String,
        name: String,
        #[source]
        source: CodecError,
    },

    /// Caller cancelled the operation while a cluster call was in flight
    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },
}

impl CredentialError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            CredentialError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CredentialError::ClusterUnreachable { .. } => ErrorKind::ClusterUnreachable,
            CredentialError::NamespaceNotFound { .. } => ErrorKind::NamespaceNotFound,
            CredentialError::EmptyCredentialRecord { .. } => ErrorKind::EmptyCredentialRecord,
            CredentialError::InvalidCredential { .. } => ErrorKind::InvalidCredential,
            CredentialError::KeyGenerationFailed { .. } => ErrorKind::KeyGenerationFailed,
            CredentialError::StoreReadFailed { .. } => ErrorKind::StoreReadFailed,
            CredentialError::StoreWriteFailed { .. } => ErrorKind::StoreWriteFailed,
            CredentialError::EncryptionFailed { .. } => ErrorKind::EncryptionFailed,
            CredentialError::DecryptionFailed { .. } => ErrorKind::DecryptionFailed,
            CredentialError::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Shorthand for `self.kind().is_transient()`
    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }

    pub(crate) fn cancelled(operation: impl Into<String>) -> Self {
        CredentialError::Cancelled {
            operation: operation.into(),
        }
    }
}

/// Classification of credential errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or malformed input (permanent - caller bug or configuration error)
    InvalidArgument,
    /// Transport/API failure talking to the control plane (transient)
    ClusterUnreachable,
    /// Namespace is missing (permanent - configuration error)
    NamespaceNotFound,
    /// Secret exists without a usable key (permanent - data integrity)
    EmptyCredentialRecord,
    /// Stored key is unreadable (permanent - data integrity)
    InvalidCredential,
    /// Key generation failed (permanent - local crypto failure)
    KeyGenerationFailed,
    /// Secret read failed (transient)
    StoreReadFailed,
    /// Secret apply failed (transient)
    StoreWriteFailed,
    /// Bundle encryption failed (permanent)
    EncryptionFailed,
    /// Bundle decryption failed (permanent)
    DecryptionFailed,
    /// Caller cancelled (permanent for this invocation)
    Cancelled,
}

impl ErrorKind {
    /// Determine if this error is transient (caller may retry) or permanent
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::ClusterUnreachable | ErrorKind::StoreReadFailed | ErrorKind::StoreWriteFailed
        )
    }

    /// Get reason string for metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::ClusterUnreachable => "cluster_unreachable",
            ErrorKind::NamespaceNotFound => "namespace_not_found",
            ErrorKind::EmptyCredentialRecord => "empty_credential_record",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::KeyGenerationFailed => "key_generation_failed",
            ErrorKind::StoreReadFailed => "store_read_failed",
            ErrorKind::StoreWriteFailed => "store_write_failed",
            ErrorKind::EncryptionFailed => "encryption_failed",
            ErrorKind::DecryptionFailed => "decryption_failed",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
