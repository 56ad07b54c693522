//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::logs::LogLevel;

/// Agent settings, read from a JSON file at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Gantry SDK installation root
    pub sdk_root: PathBuf,

    /// Account used for admin authentication
    pub user_id: String,

    /// Password for admin authentication; the GANTRY_PASSWORD environment
    /// variable takes precedence
    #[serde(default)]
    pub password: Option<String>,

    /// Admin server override; the GANTRY_SERVER environment variable takes
    /// precedence
    #[serde(default)]
    pub server: Option<String>,

    /// Port the deployed application is served on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on waiting for the rollout to report an outcome, in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Check for SDK updates before deploying
    #[serde(default = "default_true")]
    pub update_check: bool,
}

fn default_true() -> bool {
    true
}

fn default_port() -> u16 {
    80
}

fn default_startup_timeout_secs() -> u64 {
    120
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::ConfigError(format!(
                "unable to read settings file {}: {e}",
                path.display()
            ))
        })?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_get_defaults() {
        let settings: Settings = serde_json::from_str(
            r#"{"sdk_root": "/opt/gantry/sdk", "user_id": "ops@example.test"}"#,
        )
        .unwrap();

        assert_eq!(settings.log_level, LogLevel::Info);
        assert_eq!(settings.port, 80);
        assert_eq!(settings.startup_timeout_secs, 120);
        assert!(settings.update_check);
        assert!(settings.password.is_none());
        assert!(settings.server.is_none());
    }

    #[test]
    fn load_rejects_a_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/agent.json")).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }
}
