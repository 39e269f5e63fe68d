//! # Resolved Credentials
//!
//! Immutable result of resolving the agent key at startup.

use zeroize::Zeroizing;

/// How the returned key was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyResolution {
    /// A valid key was already stored; nothing was written
    Reused,
    /// No secret existed; a fresh key was generated and stored
    Created,
    /// The stored key had expired; a replacement was generated and stored
    Rotated,
}

impl KeyResolution {
    /// Get outcome string for metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyResolution::Reused => "reused",
            KeyResolution::Created => "created",
            KeyResolution::Rotated => "rotated",
        }
    }

    /// Whether resolving the key wrote to the secret store
    pub fn wrote_secret(&self) -> bool {
        !matches!(self, KeyResolution::Reused)
    }
}

impl std::fmt::Display for KeyResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The agent key handed to the caller once at startup
///
/// The key string is wiped from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    namespace: String,
    name: String,
    key: Zeroizing<String>,
    resolution: KeyResolution,
    version: String,
}

impl ResolvedCredentials {
    pub(crate) fn new(
        namespace: &str,
        name: &str,
        key: Zeroizing<String>,
        resolution: KeyResolution,
        version: String,
    ) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            key,
            resolution,
            version,
        }
    }

    /// Namespace holding the key secret
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name of the key secret
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialized agent key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn resolution(&self) -> KeyResolution {
        self.resolution
    }

    /// Store version observed (reused) or written (created, rotated)
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("resolution", &self.resolution)
            .field("version", &self.version)
            .finish()
    }
}
