//! # Agent Key Format
//!
//! Serialized form: `crane-v1.<expires_unix_secs>.<base64url 32-byte secret>`.
//! The expiry travels with the key so any reader can judge it without extra state.

use super::CodecError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

const KEY_PREFIX: &str = "crane-v1";

/// Length of the symmetric secret in bytes
pub const KEY_LEN: usize = 32;

/// Parsed agent key
pub struct AgentKey {
    secret: Zeroizing<[u8; KEY_LEN]>,
    expires_at: DateTime<Utc>,
}

impl AgentKey {
    /// Generate a random key expiring at `expires_at`
    pub fn generate(expires_at: DateTime<Utc>) -> Result<Self, CodecError> {
        let mut secret = Zeroizing::new([0u8; KEY_LEN]);
        SystemRandom::new()
            .fill(&mut secret[..])
            .map_err(|_unspecified| CodecError::Random)?;
        Ok(Self {
            secret,
            expires_at: truncate_to_seconds(expires_at),
        })
    }

    /// Parse a serialized key
    pub fn parse(encoded: &str) -> Result<Self, CodecError> {
        let mut parts = encoded.trim().splitn(3, '.');
        let (Some(prefix), Some(expiry), Some(secret)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::MalformedKey(
                "expected <prefix>.<expiry>.<secret>".to_string(),
            ));
        };

        if prefix != KEY_PREFIX {
            return Err(CodecError::MalformedKey(format!(
                "unsupported key version '{prefix}'"
            )));
        }

        let expiry_secs: i64 = expiry
            .parse()
            .map_err(|e| CodecError::MalformedKey(format!("invalid expiry '{expiry}': {e}")))?;
        let expires_at = DateTime::from_timestamp(expiry_secs, 0).ok_or_else(|| {
            CodecError::MalformedKey(format!("expiry {expiry_secs} is out of range"))
        })?;

        let decoded = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(secret)
                .map_err(|e| CodecError::MalformedKey(format!("invalid key encoding: {e}")))?,
        );
        if decoded.len() != KEY_LEN {
            return Err(CodecError::MalformedKey(format!(
                "key must be {KEY_LEN} bytes, got {}",
                decoded.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(&decoded);

        Ok(Self {
            secret: bytes,
            expires_at,
        })
    }

    /// Serialize back to the string form stored in the cluster
    pub fn encode(&self) -> String {
        format!(
            "{KEY_PREFIX}.{}.{}",
            self.expires_at.timestamp(),
            URL_SAFE_NO_PAD.encode(&self.secret[..])
        )
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub(crate) fn secret(&self) -> &[u8; KEY_LEN] {
        &self.secret
    }
}

impl std::fmt::Debug for AgentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentKey")
            .field("expires_at", &self.expires_at)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_encode_parse_preserves_key() {
        let expires_at = Utc::now() + Duration::days(30);
        let key = AgentKey::generate(expires_at).unwrap();
        let encoded = key.encode();

        assert!(encoded.starts_with("crane-v1."));
        let parsed = AgentKey::parse(&encoded).unwrap();
        assert_eq!(parsed.secret(), key.secret());
        assert_eq!(parsed.expires_at().timestamp(), expires_at.timestamp());
        assert_eq!(parsed.encode(), encoded);
    }

    #[test]
    fn test_generated_keys_differ() {
        let expires_at = Utc::now() + Duration::days(1);
        let a = AgentKey::generate(expires_at).unwrap();
        let b = AgentKey::generate(expires_at).unwrap();
        assert_ne!(a.encode(), b.encode());
    }

    #[test]
    fn test_expiry_boundary() {
        let now = Utc::now();
        let key = AgentKey::generate(now + Duration::hours(1)).unwrap();
        assert!(!key.is_expired_at(now));
        assert!(key.is_expired_at(now + Duration::hours(2)));
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        for bad in [
            "",
            "not-a-key",
            "crane-v1.123",
            "crane-v2.123.AAAA",
            "crane-v1.soon.AAAA",
            "crane-v1.123.!!!",
            "crane-v1.123.AAAA",
        ] {
            assert!(
                matches!(AgentKey::parse(bad), Err(CodecError::MalformedKey(_))),
                "'{bad}' should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = AgentKey::generate(Utc::now()).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("[REDACTED]"));
        let secret_b64 = URL_SAFE_NO_PAD.encode(key.secret());
        assert!(!rendered.contains(&secret_b64));
    }
}
