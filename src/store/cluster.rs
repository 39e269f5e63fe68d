//! # Kubernetes Secret Store
//!
//! [`SecretStore`] and [`NamespaceLister`] backed by the cluster API through `kube`.
//!
//! Writes use server-side apply (`Patch::Apply`) so creation and update are the
//! same idempotent call, attributed to the configured field manager.

use super::{
    ApplyOptions, NamespaceLister, SecretLookup, SecretRecord, SecretStore, SecretValues,
    StoreError,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

use crate::observability::metrics;

/// Secret store talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError> {
        let span = info_span!("kube.secret.get", namespace = namespace, secret.name = name);
        let start = Instant::now();

        async move {
            let result = self.secrets(namespace).get_opt(name).await;
            metrics::observe_store_operation("get", start.elapsed().as_secs_f64());

            match result? {
                Some(secret) => Ok(SecretLookup::Found(record_from_secret(namespace, secret)?)),
                None => {
                    debug!("Secret {}/{} not found", namespace, name);
                    Ok(SecretLookup::NotFound)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<SecretRecord>, StoreError> {
        let span = info_span!("kube.secret.list", namespace = namespace);
        let start = Instant::now();

        async move {
            let list = self.secrets(namespace).list(&ListParams::default()).await;
            metrics::observe_store_operation("list", start.elapsed().as_secs_f64());

            list?
                .items
                .into_iter()
                .map(|secret| record_from_secret(namespace, secret))
                .collect()
        }
        .instrument(span)
        .await
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        values: &SecretValues,
        options: &ApplyOptions,
    ) -> Result<String, StoreError> {
        let span = info_span!(
            "kube.secret.apply",
            namespace = namespace,
            secret.name = name,
            field_manager = %options.field_manager,
            force = options.force
        );
        let start = Instant::now();

        async move {
            let secret = opaque_secret(namespace, name, values);
            let mut params = PatchParams::apply(&options.field_manager);
            if options.force {
                params = params.force();
            }

            let result = self
                .secrets(namespace)
                .patch(name, &params, &Patch::Apply(&secret))
                .await;
            metrics::observe_store_operation("apply", start.elapsed().as_secs_f64());

            let applied = result.map_err(classify_apply_error)?;
            applied.metadata.resource_version.ok_or_else(|| {
                StoreError::Malformed(format!(
                    "applied secret {namespace}/{name} has no resourceVersion"
                ))
            })
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl NamespaceLister for KubeSecretStore {
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        let start = Instant::now();
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces.list(&ListParams::default()).await;
        metrics::observe_store_operation("list_namespaces", start.elapsed().as_secs_f64());

        Ok(list?
            .items
            .into_iter()
            .filter_map(|namespace| namespace.metadata.name)
            .collect())
    }
}

/// Build the apply body for an `Opaque` secret
pub(crate) fn opaque_secret(namespace: &str, name: &str, values: &SecretValues) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(
            values
                .iter()
                .map(|(key, value)| (key.clone(), ByteString(value.clone())))
                .collect(),
        ),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Convert an API object into a [`SecretRecord`]
pub(crate) fn record_from_secret(
    namespace: &str,
    secret: Secret,
) -> Result<SecretRecord, StoreError> {
    let name = secret
        .metadata
        .name
        .ok_or_else(|| StoreError::Malformed(format!("secret in {namespace} has no name")))?;

    let values = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| (key, value.0))
        .collect();

    Ok(SecretRecord {
        namespace: secret
            .metadata
            .namespace
            .unwrap_or_else(|| namespace.to_string()),
        name,
        values,
        version: secret.metadata.resource_version.unwrap_or_default(),
    })
}

/// 409 on apply means another field manager owns a field we tried to set
fn classify_apply_error(error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(response) if response.code == 409 => {
            StoreError::Conflict(response.message.clone())
        }
        other => StoreError::Api(other),
    }
}
