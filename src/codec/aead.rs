//! # AES-256-GCM Codec
//!
//! [`SecretCodec`] implementation sealing each secret value with the agent key.
//!
//! Stored value layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.
//! The value-key name is bound as associated data, so a ciphertext moved under
//! another key name fails to open.

use super::key::AgentKey;
use super::{CodecError, SecretCodec};
use crate::store::SecretValues;
use chrono::{TimeDelta, Utc};
use ring::aead::{self, Aad, BoundKey, Nonce, NonceSequence, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::BTreeMap;
use tracing::debug;
use zeroize::Zeroizing;

/// Size of AES-256-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of AES-256-GCM tag in bytes
const TAG_SIZE: usize = 16;

/// Single-use nonce sequence for AES-GCM
struct SingleNonce {
    nonce: Option<[u8; NONCE_SIZE]>,
}

impl SingleNonce {
    fn new(nonce_bytes: [u8; NONCE_SIZE]) -> Self {
        Self {
            nonce: Some(nonce_bytes),
        }
    }
}

impl NonceSequence for SingleNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        self.nonce
            .take()
            .map(Nonce::assume_unique_for_key)
            .ok_or(ring::error::Unspecified)
    }
}

/// Agent key codec
pub struct AeadSecretCodec {
    key: Option<Zeroizing<[u8; super::key::KEY_LEN]>>,
    key_lifetime: TimeDelta,
    rng: SystemRandom,
}

impl std::fmt::Debug for AeadSecretCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadSecretCodec")
            .field("key_bound", &self.key.is_some())
            .field("key_lifetime", &self.key_lifetime)
            .finish_non_exhaustive()
    }
}

impl AeadSecretCodec {
    /// Codec generating keys valid for `key_lifetime_days`
    ///
    /// Without a bound key it can generate and judge keys but not encrypt.
    pub fn new(key_lifetime_days: u32) -> Self {
        Self {
            key: None,
            key_lifetime: TimeDelta::days(i64::from(key_lifetime_days)),
            rng: SystemRandom::new(),
        }
    }

    /// Bind a serialized agent key for encryption and decryption
    pub fn with_key(mut self, agent_key: &str) -> Result<Self, CodecError> {
        let parsed = AgentKey::parse(agent_key)?;
        self.key = Some(Zeroizing::new(*parsed.secret()));
        Ok(self)
    }

    fn key_bytes(&self) -> Result<&[u8], CodecError> {
        self.key
            .as_ref()
            .map(|key| &key[..])
            .ok_or(CodecError::NoKey)
    }

    fn seal(&self, field: &str, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_unspecified| CodecError::Random)?;

        let unbound_key = UnboundKey::new(&AES_256_GCM, self.key_bytes()?)
            .map_err(|_unspecified| CodecError::Seal(field.to_string()))?;
        let mut sealing_key = aead::SealingKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut in_out = plaintext.to_vec();
        in_out.reserve(TAG_SIZE);
        sealing_key
            .seal_in_place_append_tag(Aad::from(field.as_bytes()), &mut in_out)
            .map_err(|_unspecified| CodecError::Seal(field.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + in_out.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&in_out);
        Ok(sealed)
    }

    fn open(&self, field: &str, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::Open(field.to_string()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);

        let unbound_key = UnboundKey::new(&AES_256_GCM, self.key_bytes()?)
            .map_err(|_unspecified| CodecError::Open(field.to_string()))?;
        let mut opening_key = aead::OpeningKey::new(unbound_key, SingleNonce::new(nonce_bytes));

        let mut in_out = ciphertext.to_vec();
        let plaintext = opening_key
            .open_in_place(Aad::from(field.as_bytes()), &mut in_out)
            .map_err(|_unspecified| CodecError::Open(field.to_string()))?;
        Ok(plaintext.to_vec())
    }
}

impl SecretCodec for AeadSecretCodec {
    fn encrypt(&self, values: &BTreeMap<String, String>) -> Result<SecretValues, CodecError> {
        let sealed = values
            .iter()
            .map(|(field, value)| Ok((field.clone(), self.seal(field, value.as_bytes())?)))
            .collect::<Result<SecretValues, CodecError>>()?;
        debug!(fields = sealed.len(), "Encrypted secret values");
        Ok(sealed)
    }

    fn decrypt(&self, values: &SecretValues) -> Result<BTreeMap<String, String>, CodecError> {
        values
            .iter()
            .map(|(field, sealed)| {
                let plaintext = self.open(field, sealed)?;
                let text = String::from_utf8(plaintext)
                    .map_err(|_invalid| CodecError::NotUtf8(field.clone()))?;
                Ok((field.clone(), text))
            })
            .collect()
    }

    fn is_expired(&self, key: &str) -> Result<bool, CodecError> {
        Ok(AgentKey::parse(key)?.is_expired_at(Utc::now()))
    }

    fn generate_key(&self) -> Result<String, CodecError> {
        let expires_at = Utc::now()
            .checked_add_signed(self.key_lifetime)
            .ok_or_else(|| CodecError::MalformedKey("key lifetime overflows".to_string()))?;
        Ok(AgentKey::generate(expires_at)?.encode())
    }
}
