//! Node configuration
//!
//! Loaded once at startup from a JSON file and immutable afterwards.
//!
//! ```json
//! {
//!   "node_id": "nodeA",
//!   "key_file": "replink.key",
//!   "listen_address": "127.0.0.1:9100",
//!   "verbosity": 1,
//!   "idle_timeout_ms": 30000
//! }
//! ```
//!
//! Only `key_file` is required. A relative `key_file` is resolved against
//! the directory holding the config file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{is_valid_node_id, SharedKey};

/// Highest meaningful verbosity level.
pub const MAX_VERBOSITY: u8 = 3;

/// Configuration error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Config or key file could not be read
    Unreadable,
    /// File contents do not parse
    Malformed,
    /// A field holds a value outside its domain
    InvalidValue,
}

impl ConfigErrorKind {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreadable => "REPLINK_CONFIG_UNREADABLE",
            Self::Malformed => "REPLINK_CONFIG_MALFORMED",
            Self::InvalidValue => "REPLINK_CONFIG_INVALID",
        }
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    kind: ConfigErrorKind,
    message: String,
}

impl ConfigError {
    fn new(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// File could not be read
    pub fn unreadable(msg: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Unreadable, msg)
    }

    /// File contents do not parse
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::Malformed, msg)
    }

    /// Field value out of range
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::new(ConfigErrorKind::InvalidValue, msg)
    }

    /// Get the error kind
    pub fn kind(&self) -> ConfigErrorKind {
        self.kind
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Config result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Per-node settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    /// Identity announced in `SID` messages (generated when absent)
    #[serde(default)]
    pub node_id: Option<String>,

    /// Path to the base64 pre-shared key
    pub key_file: PathBuf,

    /// Address the node listens on
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Diagnostic detail, 0-3
    #[serde(default = "default_verbosity")]
    pub verbosity: u8,

    /// Connections silent for longer than this are reaped
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_listen_address() -> String {
    "127.0.0.1:9100".to_string()
}
fn default_verbosity() -> u8 {
    1
}
fn default_idle_timeout_ms() -> u64 {
    30_000
}

impl NodeConfig {
    /// Config with defaults for everything but the key file.
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            node_id: None,
            key_file: key_file.into(),
            listen_address: default_listen_address(),
            verbosity: default_verbosity(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }

    /// Load and validate a config file.
    ///
    /// A missing `node_id` is filled with a fresh UUID so the rest of the
    /// process sees one stable identity.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::unreadable(format!("failed to read {}: {}", path.display(), e))
        })?;

        let mut config: NodeConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::malformed(format!("invalid config JSON: {}", e)))?;

        if config.key_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.key_file = dir.join(&config.key_file);
            }
        }
        if config.node_id.is_none() {
            config.node_id = Some(Uuid::new_v4().to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check every field against its domain.
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(id) = &self.node_id {
            if !is_valid_node_id(id) {
                return Err(ConfigError::invalid(format!(
                    "node_id '{}' must be non-empty and must not contain '<' or '>'",
                    id
                )));
            }
        }

        if self.key_file.as_os_str().is_empty() {
            return Err(ConfigError::invalid("key_file must not be empty"));
        }

        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::invalid("listen_address must not be empty"));
        }

        if self.verbosity > MAX_VERBOSITY {
            return Err(ConfigError::invalid(format!(
                "verbosity must be 0-{}, got {}",
                MAX_VERBOSITY, self.verbosity
            )));
        }

        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::invalid("idle_timeout_ms must be > 0"));
        }

        Ok(())
    }

    /// Node id, generating one if the config was built in code without it.
    pub fn node_id(&self) -> String {
        self.node_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    /// Reaping threshold.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Read the pre-shared key named by `key_file`.
    pub fn load_key(&self) -> ConfigResult<SharedKey> {
        let text = fs::read_to_string(&self.key_file).map_err(|e| {
            ConfigError::unreadable(format!(
                "failed to read key file {}: {}",
                self.key_file.display(),
                e
            ))
        })?;
        SharedKey::from_base64(&text).map_err(|e| {
            ConfigError::malformed(format!(
                "key file {}: {}",
                self.key_file.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "node.json", r#"{"key_file": "k.b64"}"#);

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9100");
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.key_file, dir.path().join("k.b64"));
    }

    #[test]
    fn test_node_id_generated_once() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "node.json", r#"{"key_file": "k.b64"}"#);

        let config = NodeConfig::load(&path).unwrap();
        let id = config.node_id.clone().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(config.node_id(), id);
    }

    #[test]
    fn test_explicit_node_id_kept() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "node.json",
            r#"{"node_id": "nodeA", "key_file": "/etc/replink.key", "verbosity": 3}"#,
        );

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.node_id(), "nodeA");
        assert_eq!(config.key_file, PathBuf::from("/etc/replink.key"));
        assert_eq!(config.verbosity, 3);
    }

    #[test]
    fn test_rejects_tag_breaking_node_id() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "node.json", r#"{"node_id": "a<b", "key_file": "k"}"#);

        let err = NodeConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::InvalidValue);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = NodeConfig::new("k");
        config.verbosity = 4;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::new("k");
        config.idle_timeout_ms = 0;
        assert!(config.validate().is_err());

        assert!(NodeConfig::new("k").validate().is_ok());
    }

    #[test]
    fn test_missing_key_file_field() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "node.json", r#"{"node_id": "nodeA"}"#);

        let err = NodeConfig::load(&path).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::Malformed);
        assert!(err.to_string().starts_with("REPLINK_CONFIG_MALFORMED"));
    }

    #[test]
    fn test_missing_config_file() {
        let dir = TempDir::new().unwrap();
        let err = NodeConfig::load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::Unreadable);
    }

    #[test]
    fn test_load_key() {
        let dir = TempDir::new().unwrap();
        let key = SharedKey::generate().unwrap();
        write(&dir, "k.b64", &format!("{}\n", key.to_base64()));
        let path = write(&dir, "node.json", r#"{"key_file": "k.b64"}"#);

        let config = NodeConfig::load(&path).unwrap();
        assert_eq!(config.load_key().unwrap(), key);
    }

    #[test]
    fn test_load_key_wrong_length() {
        let dir = TempDir::new().unwrap();
        write(&dir, "k.b64", "c2hvcnQ=");
        let path = write(&dir, "node.json", r#"{"key_file": "k.b64"}"#);

        let config = NodeConfig::load(&path).unwrap();
        let err = config.load_key().unwrap_err();
        assert_eq!(err.kind(), ConfigErrorKind::Malformed);
    }
}
