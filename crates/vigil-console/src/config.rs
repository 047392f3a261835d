//! Console configuration loaded from TOML
//!
//! ```toml
//! log_level = "debug"
//!
//! [session.coordinator]
//! remote_timeout_ms = 2000
//!
//! [backend]
//! latency_ms = 150
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vigil_mutation::SessionConfig;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Simulated alert backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Artificial round-trip latency in milliseconds
    pub latency_ms: u64,
    /// Reject every mutation
    pub fail: bool,
    /// Message used for rejections
    pub reject_message: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            latency_ms: 150,
            fail: false,
            reject_message: "Alert update rejected by the server".to_string(),
        }
    }
}

/// Console configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
    /// Session settings
    pub session: SessionConfig,
    /// Simulated backend settings
    pub backend: BackendConfig,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_json: false,
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl ConsoleConfig {
    /// Parse from TOML text
    ///
    /// # Errors
    /// `ConfigError::Parse` on invalid TOML or schema mismatch
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if it
    /// does not parse
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Session config with the alert type policies registered
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        let mut session = self.session.clone();
        session
            .cache
            .type_policies
            .extend(&vigil_alerts::type_policies());
        session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(ConsoleConfig::from_toml_str("").unwrap(), ConsoleConfig::default());
    }

    #[test]
    fn session_config_knows_alerts() {
        let session = ConsoleConfig::default().session_config();
        assert_eq!(
            session.cache.type_policies.key_field_for(vigil_alerts::ALERT_TYPE),
            vigil_alerts::ALERT_KEY_FIELD
        );
    }

    #[test]
    fn mistyped_values_are_rejected() {
        let err = ConsoleConfig::from_toml_str("log_json = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
