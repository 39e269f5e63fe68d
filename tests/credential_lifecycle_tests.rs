//! # Credential Lifecycle Tests
//!
//! Tests for agent key resolution against the in-memory secret store.
//!
//! These tests verify:
//! - Namespace validation happens before any secret access
//! - Missing keys are generated and stored exactly once
//! - Valid keys are reused without writes
//! - Expired keys are rotated
//! - Empty records are reported, never regenerated
//! - Store failures and cancellation map to the right error kinds

use crane_credentials::codec::CodecError;
use crane_credentials::constants::CREDENTIAL_KEY_NAME;
use crane_credentials::store::StoreError;
use crane_credentials::{
    AeadSecretCodec, ApplyOptions, CredentialError, CredentialLifecycleManager, ErrorKind,
    InMemorySecretStore, KeyResolution, NamespaceValidator, SecretCodec, SecretLookup,
    SecretStore, SecretValues,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Codec that counts key generations and can be told to fail them
struct CountingCodec {
    inner: AeadSecretCodec,
    generated: AtomicUsize,
    fail_generation: bool,
}

impl CountingCodec {
    fn new() -> Self {
        Self {
            inner: AeadSecretCodec::new(30),
            generated: AtomicUsize::new(0),
            fail_generation: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_generation: true,
            ..Self::new()
        }
    }

    fn generated(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }
}

impl SecretCodec for CountingCodec {
    fn encrypt(&self, values: &BTreeMap<String, String>) -> Result<SecretValues, CodecError> {
        self.inner.encrypt(values)
    }

    fn decrypt(&self, values: &SecretValues) -> Result<BTreeMap<String, String>, CodecError> {
        self.inner.decrypt(values)
    }

    fn is_expired(&self, key: &str) -> Result<bool, CodecError> {
        self.inner.is_expired(key)
    }

    fn generate_key(&self) -> Result<String, CodecError> {
        self.generated.fetch_add(1, Ordering::SeqCst);
        if self.fail_generation {
            return Err(CodecError::Random);
        }
        self.inner.generate_key()
    }
}

fn manager_with(
    store: &InMemorySecretStore,
    codec: Arc<CountingCodec>,
    options: ApplyOptions,
) -> CredentialLifecycleManager {
    CredentialLifecycleManager::new(
        Arc::new(store.clone()),
        NamespaceValidator::new(Arc::new(store.clone())),
        codec,
        options,
    )
}

fn manager(store: &InMemorySecretStore, codec: Arc<CountingCodec>) -> CredentialLifecycleManager {
    manager_with(store, codec, ApplyOptions::new("crane", true))
}

fn key_values(key: &str) -> SecretValues {
    BTreeMap::from([(CREDENTIAL_KEY_NAME.to_string(), key.as_bytes().to_vec())])
}

#[tokio::test]
async fn test_missing_namespace_writes_nothing() {
    let store = InMemorySecretStore::with_namespaces(["default"]);
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();

    match err {
        CredentialError::NamespaceNotFound { namespace } => assert_eq!(namespace, "prod"),
        other => panic!("Expected NamespaceNotFound, got {other:?}"),
    }
    assert_eq!(store.get_calls(), 0);
    assert_eq!(store.apply_calls(), 0);
    assert_eq!(codec.generated(), 0);
}

#[tokio::test]
async fn test_absent_record_is_generated_and_stored_once() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let resolved = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap();

    assert_eq!(resolved.resolution(), KeyResolution::Created);
    assert_eq!(resolved.namespace(), "prod");
    assert_eq!(resolved.name(), "agent-key");
    assert_eq!(codec.generated(), 1);
    assert_eq!(store.apply_calls(), 1);

    let SecretLookup::Found(record) = store.get("prod", "agent-key").await.unwrap() else {
        panic!("agent key secret was not stored");
    };
    assert_eq!(record.value_keys(), vec![CREDENTIAL_KEY_NAME]);
    assert_eq!(
        record.value(CREDENTIAL_KEY_NAME),
        Some(resolved.key().as_bytes())
    );
    assert_eq!(record.version, resolved.version());
}

#[tokio::test]
async fn test_valid_key_is_returned_verbatim_without_writes() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let existing = AeadSecretCodec::new(30).generate_key().unwrap();
    let version = store.insert("prod", "agent-key", key_values(&existing));
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let resolved = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap();

    assert_eq!(resolved.resolution(), KeyResolution::Reused);
    assert_eq!(resolved.key(), existing);
    assert_eq!(resolved.version(), version);
    assert_eq!(codec.generated(), 0);
    assert_eq!(store.apply_calls(), 0);
}

#[tokio::test]
async fn test_expired_key_is_rotated() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let expired = AeadSecretCodec::new(0).generate_key().unwrap();
    let old_version = store.insert("prod", "agent-key", key_values(&expired));
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let resolved = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap();

    assert_eq!(resolved.resolution(), KeyResolution::Rotated);
    assert_ne!(resolved.key(), expired);
    assert_ne!(resolved.version(), old_version);
    assert_eq!(codec.generated(), 1);

    let stored = store.snapshot("prod", "agent-key").unwrap();
    assert_eq!(
        stored.value(CREDENTIAL_KEY_NAME),
        Some(resolved.key().as_bytes())
    );
}

#[tokio::test]
async fn test_empty_record_is_reported_not_regenerated() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let version = store.insert("prod", "agent-key", key_values(""));
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyCredentialRecord);
    assert!(err.to_string().contains("prod/agent-key"));
    assert!(err.to_string().contains(&format!("resourceVersion: {version}")));
    assert_eq!(codec.generated(), 0);
    assert_eq!(store.apply_calls(), 0);
}

#[tokio::test]
async fn test_record_without_key_entry_is_empty() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    store.insert(
        "prod",
        "agent-key",
        BTreeMap::from([("unrelated".to_string(), b"value".to_vec())]),
    );
    let manager = manager(&store, Arc::new(CountingCodec::new()));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyCredentialRecord);
    assert_eq!(store.apply_calls(), 0);
}

#[tokio::test]
async fn test_second_call_returns_identical_key() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));
    let cancel = CancellationToken::new();

    let first = manager
        .ensure_valid_key(&cancel, "prod", "agent-key")
        .await
        .unwrap();
    let second = manager
        .ensure_valid_key(&cancel, "prod", "agent-key")
        .await
        .unwrap();

    assert_eq!(first.resolution(), KeyResolution::Created);
    assert_eq!(second.resolution(), KeyResolution::Reused);
    assert_eq!(first.key(), second.key());
    assert_eq!(codec.generated(), 1);
    assert_eq!(store.apply_calls(), 1);
}

#[tokio::test]
async fn test_namespace_listing_failure_is_cluster_unreachable() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    store.fail_namespace_listing(true);
    let manager = manager(&store, Arc::new(CountingCodec::new()));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClusterUnreachable);
    assert!(err.is_transient());
    assert_eq!(store.get_calls(), 0);
}

#[tokio::test]
async fn test_read_failure_is_store_read_failed() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    store.fail_gets(true);
    let codec = Arc::new(CountingCodec::new());
    let manager = manager(&store, Arc::clone(&codec));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    match err {
        CredentialError::StoreReadFailed {
            namespace,
            name,
            source: StoreError::Unavailable(_),
        } => {
            assert_eq!(namespace, "prod");
            assert_eq!(name, "agent-key");
        }
        other => panic!("Expected StoreReadFailed, got {other:?}"),
    }
    assert_eq!(codec.generated(), 0);
}

#[tokio::test]
async fn test_write_failure_is_store_write_failed() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    store.fail_applies(true);
    let manager = manager(&store, Arc::new(CountingCodec::new()));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StoreWriteFailed);
    assert!(store.snapshot("prod", "agent-key").is_none());
}

#[tokio::test]
async fn test_generation_failure_writes_nothing() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let manager = manager(&store, Arc::new(CountingCodec::failing()));

    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyGenerationFailed);
    assert_eq!(store.apply_calls(), 0);
}

#[tokio::test]
async fn test_conflict_without_force_is_store_write_failed() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let expired = AeadSecretCodec::new(0).generate_key().unwrap();
    store
        .apply(
            "prod",
            "agent-key",
            &key_values(&expired),
            &ApplyOptions::new("someone-else", false),
        )
        .await
        .unwrap();

    let manager = manager_with(
        &store,
        Arc::new(CountingCodec::new()),
        ApplyOptions::new("crane", false),
    );
    let err = manager
        .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
        .await
        .unwrap_err();
    match err {
        CredentialError::StoreWriteFailed {
            source: StoreError::Conflict(_),
            ..
        } => {}
        other => panic!("Expected StoreWriteFailed with a conflict, got {other:?}"),
    }

    // Forcing takes over the field
    let forced = manager_with(
        &store,
        Arc::new(CountingCodec::new()),
        ApplyOptions::new("crane", true),
    )
    .ensure_valid_key(&CancellationToken::new(), "prod", "agent-key")
    .await
    .unwrap();
    assert_eq!(forced.resolution(), KeyResolution::Rotated);
}

#[tokio::test]
async fn test_cancelled_token_stops_before_cluster_calls() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    let manager = manager(&store, Arc::new(CountingCodec::new()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = manager
        .ensure_valid_key(&cancel, "prod", "agent-key")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(store.namespace_calls(), 0);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let store = InMemorySecretStore::with_namespaces(["prod"]);
    store.set_latency(Some(Duration::from_secs(30)));
    let manager = manager(&store, Arc::new(CountingCodec::new()));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = manager
        .ensure_valid_key(&cancel, "prod", "agent-key")
        .await
        .unwrap_err();
    match err {
        CredentialError::Cancelled { operation } => assert_eq!(operation, "listing namespaces"),
        other => panic!("Expected Cancelled, got {other:?}"),
    }
    assert_eq!(store.apply_calls(), 0);
}
