//! # Secret Codec
//!
//! Key generation, expiry judgement and value encryption for secret bundles.
//!
//! ## Module Structure
//!
//! - `key.rs` - Agent key string format
//! - `aead.rs` - AES-256-GCM codec built on `ring`

mod aead;
mod key;

pub use aead::AeadSecretCodec;
pub use key::AgentKey;

use crate::store::SecretValues;
use std::collections::BTreeMap;
use thiserror::Error;

/// Codec failures
#[derive(Debug, Error)]
pub enum CodecError {
    /// Key string does not follow the agent key format
    #[error("malformed agent key: {0}")]
    MalformedKey(String),
    /// Encryption or decryption requested on a codec without a bound key
    #[error("codec has no agent key bound")]
    NoKey,
    /// System random source failed
    #[error("random number generation failed")]
    Random,
    #[error("sealing value '{0}' failed")]
    Seal(String),
    #[error("opening value '{0}' failed (wrong key or tampered data)")]
    Open(String),
    #[error("decrypted value '{0}' is not valid UTF-8")]
    NotUtf8(String),
}

/// Encryption, decryption and key lifecycle decisions used by the credential
/// manager and the secret synchronizer
pub trait SecretCodec: Send + Sync {
    /// Encrypt every plaintext value, keeping key names unchanged
    fn encrypt(&self, values: &BTreeMap<String, String>) -> Result<SecretValues, CodecError>;

    /// Reverse of [`SecretCodec::encrypt`]
    fn decrypt(&self, values: &SecretValues) -> Result<BTreeMap<String, String>, CodecError>;

    /// Whether a serialized key is past its expiry
    fn is_expired(&self, key: &str) -> Result<bool, CodecError>;

    /// Produce fresh serialized key material
    fn generate_key(&self) -> Result<String, CodecError>;
}
