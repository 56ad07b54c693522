//! Error types for the Gantry agent

use std::time::Duration;

use thiserror::Error;

/// Main error type for the Gantry agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Archive error: {0}")]
    ArchiveError(String),

    #[error("Deployment failed: {0}")]
    DeployFailed(String),

    #[error("Deployment outcome still undetermined after {0:?}")]
    DeployTimeout(Duration),

    #[error("SDK too old: {0}")]
    SdkTooOld(String),

    #[error("Deployment wait interrupted")]
    Interrupted,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
