//! Gantry SDK installation metadata

use std::path::{Path, PathBuf};

use crate::errors::AgentError;

/// Default admin server for deployments.
pub const DEFAULT_SERVER: &str = "https://deploy.gantry.io";

/// Environment variable selecting an alternate admin server.
pub const SERVER_ENV_VAR: &str = "GANTRY_SERVER";

/// Local Gantry SDK installation.
#[derive(Debug, Clone)]
pub struct SdkInfo {
    root: PathBuf,
}

impl SdkInfo {
    /// Validate and record the SDK root directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AgentError::ConfigError(format!(
                "SDK root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Installed SDK version, from the VERSION file at the root.
    pub fn version(&self) -> Result<String, AgentError> {
        let raw = std::fs::read_to_string(self.root.join("VERSION"))?;
        Ok(raw.trim().to_string())
    }

    /// Directory holding the config schema documents.
    pub fn schema_dir(&self) -> PathBuf {
        self.root.join("schemas")
    }
}
