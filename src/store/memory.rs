//! # In-Memory Secret Store
//!
//! A process-local stand-in for the cluster secret API.
//!
//! Emulates the parts of server-side apply this crate relies on: a monotonically
//! increasing resource version shared across all objects, per-field ownership by
//! field manager, conflicts when another manager owns a field and `force` is off,
//! and removal of fields a manager stops applying. Call counters and failure
//! switches make it usable as a test double; the CLI uses it for `--dry-run`.

use super::{
    ApplyOptions, NamespaceLister, SecretLookup, SecretRecord, SecretStore, SecretValues,
    StoreError,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct StoredSecret {
    values: SecretValues,
    /// value key -> owning field manager
    owners: BTreeMap<String, String>,
    version: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct Failures {
    get: bool,
    list: bool,
    apply: bool,
    namespaces: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct CallCounts {
    get: usize,
    list: usize,
    apply: usize,
    namespaces: usize,
}

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeSet<String>,
    secrets: BTreeMap<(String, String), StoredSecret>,
    last_version: u64,
    failures: Failures,
    calls: CallCounts,
    latency: Option<Duration>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }

    fn record(namespace: &str, name: &str, stored: &StoredSecret) -> SecretRecord {
        SecretRecord {
            namespace: namespace.to_string(),
            name: name.to_string(),
            values: stored.values.clone(),
            version: stored.version.clone(),
        }
    }
}

/// Shared, cloneable in-memory secret store
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretStore {
    state: Arc<Mutex<State>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that already knows the given namespaces
    pub fn with_namespaces<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for namespace in namespaces {
            store.add_namespace(namespace);
        }
        store
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_namespace(&self, namespace: impl Into<String>) {
        self.state().namespaces.insert(namespace.into());
    }

    /// Write a secret directly, bypassing apply semantics and call counters
    pub fn insert(&self, namespace: &str, name: &str, values: SecretValues) -> String {
        let mut state = self.state();
        let version = state.next_version();
        state.secrets.insert(
            (namespace.to_string(), name.to_string()),
            StoredSecret {
                values,
                owners: BTreeMap::new(),
                version: version.clone(),
            },
        );
        version
    }

    /// Current contents of a secret, if present
    pub fn snapshot(&self, namespace: &str, name: &str) -> Option<SecretRecord> {
        let state = self.state();
        state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .map(|stored| State::record(namespace, name, stored))
    }

    pub fn fail_gets(&self, fail: bool) {
        self.state().failures.get = fail;
    }

    pub fn fail_lists(&self, fail: bool) {
        self.state().failures.list = fail;
    }

    pub fn fail_applies(&self, fail: bool) {
        self.state().failures.apply = fail;
    }

    pub fn fail_namespace_listing(&self, fail: bool) {
        self.state().failures.namespaces = fail;
    }

    /// Delay every call, to exercise cancellation
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    pub fn get_calls(&self) -> usize {
        self.state().calls.get
    }

    pub fn list_calls(&self) -> usize {
        self.state().calls.list
    }

    pub fn apply_calls(&self) -> usize {
        self.state().calls.apply
    }

    pub fn namespace_calls(&self) -> usize {
        self.state().calls.namespaces
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<SecretLookup, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.get += 1;
        if state.failures.get {
            return Err(StoreError::Unavailable(format!(
                "injected failure reading {namespace}/{name}"
            )));
        }

        Ok(state
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .map_or(SecretLookup::NotFound, |stored| {
                SecretLookup::Found(State::record(namespace, name, stored))
            }))
    }

    async fn list(&self, namespace: &str) -> Result<Vec<SecretRecord>, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.list += 1;
        if state.failures.list {
            return Err(StoreError::Unavailable(format!(
                "injected failure listing secrets in {namespace}"
            )));
        }

        Ok(state
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|((ns, name), stored)| State::record(ns, name, stored))
            .collect())
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        values: &SecretValues,
        options: &ApplyOptions,
    ) -> Result<String, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.apply += 1;
        if state.failures.apply {
            return Err(StoreError::Unavailable(format!(
                "injected failure applying {namespace}/{name}"
            )));
        }

        let key = (namespace.to_string(), name.to_string());
        let mut stored = state.secrets.remove(&key).unwrap_or_default();

        let conflicts: Vec<String> = values
            .iter()
            .filter(|(field, value)| {
                stored.owners.get(*field).is_some_and(|owner| {
                    owner != &options.field_manager
                        && stored.values.get(*field) != Some(*value)
                })
            })
            .map(|(field, _)| field.clone())
            .collect();

        if !conflicts.is_empty() && !options.force {
            state.secrets.insert(key, stored);
            return Err(StoreError::Conflict(format!(
                "fields {conflicts:?} of {namespace}/{name} are owned by another manager"
            )));
        }

        // Fields this manager applied before but dropped now are removed
        let released: Vec<String> = stored
            .owners
            .iter()
            .filter(|(field, owner)| {
                *owner == &options.field_manager && !values.contains_key(*field)
            })
            .map(|(field, _)| field.clone())
            .collect();
        for field in released {
            stored.owners.remove(&field);
            stored.values.remove(&field);
        }

        for (field, value) in values {
            stored.values.insert(field.clone(), value.clone());
            stored
                .owners
                .insert(field.clone(), options.field_manager.clone());
        }

        let version = state.next_version();
        stored.version.clone_from(&version);
        state.secrets.insert(key, stored);
        debug!(
            "In-memory apply of {}/{} by {} (version {})",
            namespace, name, options.field_manager, version
        );
        Ok(version)
    }
}

#[async_trait]
impl NamespaceLister for InMemorySecretStore {
    async fn list_namespaces(&self) -> Result<Vec<String>, StoreError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.calls.namespaces += 1;
        if state.failures.namespaces {
            return Err(StoreError::Unavailable(
                "injected failure listing namespaces".to_string(),
            ));
        }
        Ok(state.namespaces.iter().cloned().collect())
    }
}
