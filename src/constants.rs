//! # Constants
//!
//! Default values and reserved names shared by the credential manager,
//! the secret synchronizer and the binaries.

/// Reserved value-key name under which the agent private key is stored
/// inside its Kubernetes Secret.
pub const CREDENTIAL_KEY_NAME: &str = "private.key";

/// Default namespace holding the agent key secret
pub const DEFAULT_NAMESPACE: &str = "crane-system";

/// Default name of the agent key secret
pub const DEFAULT_SECRET_NAME: &str = "crane-agent-key";

/// Default field manager used for server-side apply
pub const DEFAULT_FIELD_MANAGER: &str = "crane";

/// Default force-on-conflict policy for server-side apply
pub const DEFAULT_FORCE_ON_CONFLICTS: bool = true;

/// Default lifetime of a freshly generated agent key (days)
pub const DEFAULT_KEY_LIFETIME_DAYS: u32 = 365;

/// Default per-operation timeout used by the binaries (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable pointing at an optional YAML configuration file
pub const CONFIG_FILE_ENV: &str = "CRANE_CONFIG_FILE";

/// Default tracing filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "crane_credentials=info";
