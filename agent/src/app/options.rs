//! Application configuration options

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::sdk::info;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// SDK installation configuration
    pub sdk: SdkOptions,

    /// Admin credentials
    pub credentials: CredentialOptions,

    /// Deployment configuration
    pub deploy: DeployOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            sdk: SdkOptions::default(),
            credentials: CredentialOptions::default(),
            deploy: DeployOptions::default(),
        }
    }
}

/// SDK installation options
#[derive(Debug, Clone)]
pub struct SdkOptions {
    /// SDK installation root
    pub root: PathBuf,

    /// Admin server override; environment and default apply when unset
    pub server: Option<String>,
}

impl SdkOptions {
    /// Admin server to deploy against: environment override first, then
    /// the configured value, then the default.
    pub fn server(&self) -> String {
        env::var(info::SERVER_ENV_VAR)
            .ok()
            .or_else(|| self.server.clone())
            .unwrap_or_else(|| info::DEFAULT_SERVER.to_string())
    }
}

impl Default for SdkOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/opt/gantry/sdk"),
            server: None,
        }
    }
}

/// Admin credential options
#[derive(Debug, Clone)]
pub struct CredentialOptions {
    /// Account used for admin authentication
    pub user_id: String,

    /// Password for admin authentication; kept out of Debug output
    pub password: SecretString,
}

impl Default for CredentialOptions {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            password: SecretString::from(String::new()),
        }
    }
}

/// Deployment options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Bound on waiting for the rollout to report an outcome
    pub startup_timeout: Duration,

    /// Port the deployed application is served on
    pub port: u16,

    /// Check for SDK updates before deploying
    pub update_check: bool,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(120),
            port: 80,
            update_check: true,
        }
    }
}
