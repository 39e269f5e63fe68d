//! # Validation
//!
//! Validates namespace and secret names before they reach the cluster.

use crate::error::CredentialError;
use regex::Regex;

/// Maximum length of a namespace name (RFC 1123 label)
const MAX_NAMESPACE_LEN: usize = 63;

/// Maximum length of a secret name (RFC 1123 subdomain)
const MAX_SECRET_NAME_LEN: usize = 253;

/// Validate a namespace name
///
/// Namespaces are RFC 1123 labels: lowercase alphanumerics and `-`, starting and
/// ending with an alphanumeric, at most 63 characters.
pub(crate) fn validate_namespace(namespace: &str) -> Result<(), CredentialError> {
    if namespace.is_empty() {
        return Err(CredentialError::InvalidArgument(
            "namespace cannot be empty".to_string(),
        ));
    }

    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(CredentialError::InvalidArgument(format!(
            "namespace '{namespace}' exceeds {MAX_NAMESPACE_LEN} characters"
        )));
    }

    let label_regex = Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").map_err(|e| {
        CredentialError::InvalidArgument(format!("Failed to compile namespace regex: {e}"))
    })?;

    if !label_regex.is_match(namespace) {
        return Err(CredentialError::InvalidArgument(format!(
            "namespace '{namespace}' is not a valid RFC 1123 label \
             (lowercase alphanumerics and '-', must start and end with an alphanumeric)"
        )));
    }

    Ok(())
}

/// Validate a secret name
///
/// Secret names are RFC 1123 subdomains: dot-separated labels, at most 253
/// characters overall.
pub(crate) fn validate_secret_name(name: &str) -> Result<(), CredentialError> {
    if name.is_empty() {
        return Err(CredentialError::InvalidArgument(
            "secret name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_SECRET_NAME_LEN {
        return Err(CredentialError::InvalidArgument(format!(
            "secret name '{name}' exceeds {MAX_SECRET_NAME_LEN} characters"
        )));
    }

    let subdomain_regex =
        Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
            .map_err(|e| {
                CredentialError::InvalidArgument(format!("Failed to compile secret name regex: {e}"))
            })?;

    if !subdomain_regex.is_match(name) {
        return Err(CredentialError::InvalidArgument(format!(
            "secret name '{name}' is not a valid RFC 1123 subdomain"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("prod").is_ok());
        assert!(validate_namespace("crane-system").is_ok());
        assert!(validate_namespace("a").is_ok());
        assert!(validate_namespace(&"a".repeat(63)).is_ok());

        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("Prod").is_err());
        assert!(validate_namespace("-prod").is_err());
        assert!(validate_namespace("prod-").is_err());
        assert!(validate_namespace("prod.eu").is_err());
        assert!(validate_namespace(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_validate_secret_name() {
        assert!(validate_secret_name("agent-key").is_ok());
        assert!(validate_secret_name("crane.agent-key").is_ok());
        assert!(validate_secret_name("k1").is_ok());

        assert!(validate_secret_name("").is_err());
        assert!(validate_secret_name("agent_key").is_err());
        assert!(validate_secret_name("agent..key").is_err());
        assert!(validate_secret_name(".agent").is_err());
        assert!(validate_secret_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn test_empty_message() {
        let err = validate_namespace("").unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: namespace cannot be empty");
    }
}
