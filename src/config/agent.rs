//! # Agent Config
//!
//! Where the agent key lives and how writes to the secret store are attributed.

use crate::constants::*;
use crate::store::ApplyOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Agent credential configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Namespace holding the agent key secret
    pub namespace: String,
    /// Name of the agent key secret
    pub secret_name: String,
    /// Field manager writes are attributed to
    pub field_manager: String,
    /// Take over fields owned by other managers on apply
    pub force_on_conflicts: bool,
    /// Lifetime of a newly generated key (days)
    pub key_lifetime_days: u32,
    /// Upper bound for one bootstrap or CLI command (seconds)
    pub request_timeout_secs: u64,
}

/// YAML overlay; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ConfigFile {
    namespace: Option<String>,
    secret_name: Option<String>,
    field_manager: Option<String>,
    force_on_conflicts: Option<bool>,
    key_lifetime_days: Option<u32>,
    request_timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            force_on_conflicts: DEFAULT_FORCE_ON_CONFLICTS,
            key_lifetime_days: DEFAULT_KEY_LIFETIME_DAYS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// When `CRANE_CONFIG_FILE` is set the file is applied on top of the
    /// defaults first; environment variables win over both.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };
        let config = base.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid by a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: ConfigFile = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config file {}", path.display());

        let defaults = Self::default();
        Ok(Self {
            namespace: file.namespace.unwrap_or(defaults.namespace),
            secret_name: file.secret_name.unwrap_or(defaults.secret_name),
            field_manager: file.field_manager.unwrap_or(defaults.field_manager),
            force_on_conflicts: file
                .force_on_conflicts
                .unwrap_or(defaults.force_on_conflicts),
            key_lifetime_days: file.key_lifetime_days.unwrap_or(defaults.key_lifetime_days),
            request_timeout_secs: file
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
        })
    }

    fn with_env_overrides(self) -> Self {
        Self {
            namespace: env_var_or_default("CRANE_NAMESPACE", self.namespace),
            secret_name: env_var_or_default("CRANE_SECRET_NAME", self.secret_name),
            field_manager: env_var_or_default("CRANE_FIELD_MANAGER", self.field_manager),
            force_on_conflicts: env_var_or_default(
                "CRANE_FORCE_ON_CONFLICTS",
                self.force_on_conflicts,
            ),
            key_lifetime_days: env_var_or_default(
                "CRANE_KEY_LIFETIME_DAYS",
                self.key_lifetime_days,
            ),
            request_timeout_secs: env_var_or_default(
                "CRANE_REQUEST_TIMEOUT_SECS",
                self.request_timeout_secs,
            ),
        }
    }

    /// Reject settings that can never work
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace cannot be empty".to_string()));
        }
        if self.secret_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "secret name cannot be empty".to_string(),
            ));
        }
        if self.field_manager.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "field manager cannot be empty".to_string(),
            ));
        }
        if self.key_lifetime_days == 0 {
            return Err(ConfigError::Invalid(
                "key lifetime must be at least one day".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Server-side apply settings for every write
    pub fn apply_options(&self) -> ApplyOptions {
        ApplyOptions::new(self.field_manager.clone(), self.force_on_conflicts)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.namespace, "crane-system");
        assert_eq!(config.apply_options(), ApplyOptions::new("crane", true));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_from_file_overlays_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "namespace: prod\nsecretName: agent-key\nforceOnConflicts: false\nkeyLifetimeDays: 7"
        )
        .unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.namespace, "prod");
        assert_eq!(config.secret_name, "agent-key");
        assert!(!config.force_on_conflicts);
        assert_eq!(config.key_lifetime_days, 7);
        assert_eq!(config.field_manager, DEFAULT_FIELD_MANAGER);
    }

    #[test]
    fn test_from_file_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespaces: prod").unwrap();
        assert!(matches!(
            AgentConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = AgentConfig::from_file(Path::new("/nonexistent/crane.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/crane.yaml"));
    }

    #[test]
    fn test_validate() {
        let invalid = [
            AgentConfig {
                namespace: " ".to_string(),
                ..AgentConfig::default()
            },
            AgentConfig {
                secret_name: String::new(),
                ..AgentConfig::default()
            },
            AgentConfig {
                field_manager: String::new(),
                ..AgentConfig::default()
            },
            AgentConfig {
                key_lifetime_days: 0,
                ..AgentConfig::default()
            },
            AgentConfig {
                request_timeout_secs: 0,
                ..AgentConfig::default()
            },
        ];
        for config in invalid {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }
}
