//! # Metrics Tests
//!
//! Verifies metric registration and text exposition after a key resolution.

use crane_credentials::observability::metrics::{gather_metrics, register_metrics};
use crane_credentials::{
    AeadSecretCodec, ApplyOptions, CredentialLifecycleManager, InMemorySecretStore,
    NamespaceValidator,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_registered_metrics_are_exposed() {
    register_metrics().unwrap();
    assert!(register_metrics().is_err(), "second registration must fail");

    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let manager = CredentialLifecycleManager::new(
        Arc::new(store.clone()),
        NamespaceValidator::new(Arc::new(store)),
        Arc::new(AeadSecretCodec::new(30)),
        ApplyOptions::new("crane", true),
    );
    let cancel = CancellationToken::new();
    manager
        .ensure_valid_key(&cancel, "prod", "agent-key")
        .await
        .unwrap();
    manager
        .ensure_valid_key(&cancel, "missing", "agent-key")
        .await
        .unwrap_err();

    let exposition = gather_metrics().unwrap();
    assert!(exposition.contains("crane_key_resolutions_total{outcome=\"created\"} 1"));
    assert!(exposition.contains("crane_credential_errors_total{kind=\"namespace_not_found\"} 1"));
    assert!(exposition.contains("crane_secret_applies_total 1"));
}
