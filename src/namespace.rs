//! # Namespace Validation
//!
//! Confirms a namespace exists on the cluster before any secret in it is touched.

use crate::error::CredentialError;
use crate::store::{with_cancellation, NamespaceLister};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Checks namespace existence by listing every namespace on the cluster
#[derive(Clone)]
pub struct NamespaceValidator {
    lister: Arc<dyn NamespaceLister>,
}

impl std::fmt::Debug for NamespaceValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespaceValidator").finish_non_exhaustive()
    }
}

impl NamespaceValidator {
    pub fn new(lister: Arc<dyn NamespaceLister>) -> Self {
        Self { lister }
    }

    /// Whether `namespace` is present on the cluster
    ///
    /// A failed listing is `ClusterUnreachable`; absence is `Ok(false)`.
    pub async fn exists(
        &self,
        cancel: &CancellationToken,
        namespace: &str,
    ) -> Result<bool, CredentialError> {
        let namespaces =
            with_cancellation(cancel, "listing namespaces", self.lister.list_namespaces())
                .await?
                .map_err(|source| CredentialError::ClusterUnreachable {
                    operation: "listing namespaces".to_string(),
                    source,
                })?;

        let found = namespaces.iter().any(|candidate| candidate == namespace);
        debug!(
            namespace = namespace,
            known = namespaces.len(),
            found,
            "Checked namespace existence"
        );
        Ok(found)
    }
}
