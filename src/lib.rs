//! # Crane Credentials
//!
//! Bootstrap and credential lifecycle for a cluster-resident agent.
//!
//! The agent keeps its private key in a Kubernetes `Secret` instead of on local
//! disk, so the key survives pod restarts and is shared across redeployments.
//!
//! ## Overview
//!
//! 1. **Namespace validation** - the target namespace must exist before any secret is touched
//! 2. **Key lookup** - the stored key is read from the `private.key` entry of the secret
//! 3. **Expiry check** - an expired key is rotated through the same apply path used for creation
//! 4. **Resolution** - the caller receives an immutable [`ResolvedCredentials`] value
//!
//! [`sync::SecretSynchronizer`] exposes the same server-side apply primitive for
//! arbitrary encrypted secret bundles.

pub mod codec;
pub mod config;
pub mod constants;
pub mod credential;
pub mod error;
pub mod namespace;
pub mod observability;
pub mod runtime;
pub mod store;
pub mod sync;

pub use codec::{AeadSecretCodec, AgentKey, SecretCodec};
pub use config::AgentConfig;
pub use credential::{CredentialLifecycleManager, KeyResolution, ResolvedCredentials};
pub use error::{CredentialError, ErrorKind};
pub use namespace::NamespaceValidator;
pub use store::{
    ApplyOptions, InMemorySecretStore, KubeSecretStore, NamespaceLister, SecretLookup,
    SecretRecord, SecretStore, SecretValues,
};
pub use sync::{AppliedSecretRegistry, SecretSynchronizer};
