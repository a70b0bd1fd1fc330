//! Configuration management for the module host
//!
//! Handles configuration loading, validation and defaults. Every field is
//! optional in the JSON file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ipc::channel::DEFAULT_MAX_MESSAGE_LENGTH;
use crate::utils::version::Version;

/// IPC configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Reply timeout of communicator requests, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Longest message line, in bytes; longer lines are skipped
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_message_length() -> usize {
    DEFAULT_MAX_MESSAGE_LENGTH
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_message_length: default_max_message_length(),
        }
    }
}

impl IpcConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Module system configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Directories whose units are loaded at startup
    #[serde(default)]
    pub module_dirs: Vec<String>,

    /// Single units loaded at startup
    #[serde(default)]
    pub modules: Vec<String>,

    /// Binary run for child hosts (defaults to the current executable)
    #[serde(default)]
    pub host_executable: Option<String>,

    /// Skip modules whose loading mode is not `Always`
    #[serde(default)]
    pub respect_loading_mode: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default)]
    pub json_format: bool,
}

/// Host configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Semantic version of this host (defaults to the crate version)
    #[serde(default)]
    pub host_version: Option<String>,

    #[serde(default)]
    pub ipc: IpcConfig,

    #[serde(default)]
    pub modules: ModulesConfig,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl HostConfig {
    /// Load configuration from JSON file
    pub fn from_json_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HostConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref version) = self.host_version {
            Version::parse(version)
                .map_err(|e| anyhow::anyhow!("host_version \"{}\" is invalid: {}", version, e))?;
        }

        if self.ipc.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "ipc.request_timeout_ms must be greater than 0"
            ));
        }

        if self.ipc.max_message_length == 0 {
            return Err(anyhow::anyhow!(
                "ipc.max_message_length must be greater than 0"
            ));
        }

        Ok(())
    }

    /// Configured host version, or the crate version
    pub fn host_version(&self) -> String {
        self.host_version
            .clone()
            .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string())
    }

    pub fn host_executable(&self) -> Option<PathBuf> {
        self.modules.host_executable.as_ref().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: HostConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.ipc.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.ipc.max_message_length, DEFAULT_MAX_MESSAGE_LENGTH);
        assert_eq!(config.host_version(), env!("CARGO_PKG_VERSION"));
        config.validate().unwrap();
    }

    #[test]
    fn test_json_file_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("host.json");
        let config = HostConfig {
            host_version: Some("2.1.0".to_string()),
            ipc: IpcConfig {
                request_timeout_ms: 250,
                max_message_length: 4096,
            },
            modules: ModulesConfig {
                module_dirs: vec!["modules".to_string()],
                respect_loading_mode: true,
                ..ModulesConfig::default()
            },
            logging: Some(LoggingConfig {
                filter: Some("debug".to_string()),
                json_format: false,
            }),
        };
        config.to_json_file(&path).unwrap();
        assert_eq!(HostConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = HostConfig {
            host_version: Some("v-next".to_string()),
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HostConfig {
            ipc: IpcConfig {
                request_timeout_ms: 0,
                ..IpcConfig::default()
            },
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HostConfig {
            ipc: IpcConfig {
                max_message_length: 0,
                ..IpcConfig::default()
            },
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HostConfig {
            host_version: Some("1.0".to_string()),
            ..HostConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
