//! Admin client for the Gantry deployment service
//!
//! Concrete [`AppDeployer`] implementation. Walks the rollout through
//! staging, upload, availability verification, and index update, and
//! reports every step through the listener's event surface; no outcome
//! ever travels through a return value.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::deploy::listener::{DeployListener, FailureCause, FailureEvent, SuccessEvent};
use crate::deploy::AppDeployer;
use crate::errors::AgentError;
use crate::models::application::{Application, ManifestEntry};
use crate::utils::generate_uuid;

/// Checks performed before giving up on availability verification.
const VERIFY_ATTEMPTS: u32 = 30;

/// Connection settings for the admin service.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub server: String,
    pub user_id: String,
    pub password: SecretString,
}

/// HTTP client for the Gantry admin service.
pub struct AdminClient {
    client: reqwest::Client,
    server: String,
    user_id: String,
    password: SecretString,
}

impl AdminClient {
    pub fn new(options: ConnectOptions) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            server: options.server.trim_end_matches('/').to_string(),
            user_id: options.user_id,
            password: options.password,
        })
    }

    fn auth_header(&self) -> String {
        let raw = format!("{}:{}", self.user_id, self.password.expose_secret());
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(raw)
        )
    }

    async fn begin(&self, app: &Application) -> Result<BeginDeploymentResponse, FailureEvent> {
        let url = format!(
            "{}/api/apps/{}/versions/{}/deployments",
            self.server,
            app.app_id(),
            app.version()
        );
        debug!("POST {}", url);

        let body = BeginDeploymentRequest {
            manifest: app.manifest(),
            created_at: Utc::now(),
        };
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failure("unable to open a deployment", e))?;

        parse_response(response, "deployment rejected by the admin service").await
    }

    async fn upload_file(
        &self,
        deployment_id: &str,
        entry: &ManifestEntry,
        staging: &std::path::Path,
    ) -> Result<(), FailureEvent> {
        let url = format!(
            "{}/api/deployments/{}/files/{}",
            self.server, deployment_id, entry.sha256
        );
        debug!("PUT {}", url);

        let data = fs::read(staging.join(&entry.path)).map_err(|e| FailureEvent {
            message: format!("Deployment failed: unable to read staged file {}: {e}", entry.path),
            cause: None,
            details: None,
        })?;
        let response = self
            .client
            .put(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .body(data)
            .send()
            .await
            .map_err(|e| transport_failure("file upload failed", e))?;

        parse_unit_response(response, "file upload rejected").await
    }

    async fn upload_index(
        &self,
        deployment_id: &str,
        app: &Application,
    ) -> Result<(), FailureEvent> {
        let index_path = app.root().join("index.json");
        let indexes: serde_json::Value = if index_path.exists() {
            let raw = fs::read_to_string(&index_path).map_err(|e| FailureEvent {
                message: format!("Deployment failed: unable to read index definitions: {e}"),
                cause: None,
                details: None,
            })?;
            serde_json::from_str(&raw).map_err(|e| FailureEvent {
                message: format!("Deployment failed: invalid index definitions: {e}"),
                cause: None,
                details: None,
            })?
        } else {
            serde_json::json!([])
        };

        let url = format!("{}/api/deployments/{}/index", self.server, deployment_id);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .json(&indexes)
            .send()
            .await
            .map_err(|e| transport_failure("index update failed", e))?;

        parse_unit_response(response, "index update rejected").await
    }

    async fn commit(&self, deployment_id: &str) -> Result<(), FailureEvent> {
        let url = format!("{}/api/deployments/{}/commit", self.server, deployment_id);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| transport_failure("unable to commit the deployment", e))?;

        parse_unit_response(response, "commit rejected").await
    }

    async fn fetch_state(&self, deployment_id: &str) -> Result<DeploymentState, FailureEvent> {
        let url = format!("{}/api/deployments/{}", self.server, deployment_id);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| transport_failure("unable to query deployment state", e))?;

        parse_response(response, "state query rejected").await
    }

    /// Poll the admin service until the new version serves traffic.
    async fn verify_availability(
        &self,
        deployment_id: &str,
        listener: &mut DeployListener,
    ) -> Result<Option<String>, FailureEvent> {
        for _ in 0..VERIFY_ATTEMPTS {
            let state = self.fetch_state(deployment_id).await?;
            match state.state.as_str() {
                "served" => return Ok(state.details),
                "failed" => return Err(remote_failure(state)),
                _ => {
                    listener.on_progress(80, "Will check again in 1 seconds.");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        Err(FailureEvent {
            message: format!(
                "Deployment failed: version not available after {VERIFY_ATTEMPTS} checks"
            ),
            cause: Some(FailureCause::Rejected),
            details: None,
        })
    }

    async fn run_update(
        &self,
        app: &Application,
        listener: &mut DeployListener,
    ) -> Result<SuccessEvent, FailureEvent> {
        listener.on_progress(0, &format!("Preparing to deploy {}", app.app_id()));

        let staging = stage_archive(app).map_err(|e| FailureEvent {
            message: format!("Deployment failed: unable to stage the archive: {e}"),
            cause: None,
            details: None,
        })?;
        listener.on_progress(5, &format!("Created staging directory {}", staging.display()));
        listener.on_progress(10, "Scanning files on local disk");

        let begun = self.begin(app).await?;
        listener.on_progress(20, &format!("Deploying {}", app.app_id()));

        let missing: Vec<&ManifestEntry> = app
            .manifest()
            .iter()
            .filter(|entry| begun.missing.contains(&entry.sha256))
            .collect();
        listener.on_progress(30, &format!("Uploading {} files", missing.len()));
        for entry in missing {
            self.upload_file(&begun.deployment_id, entry, &staging).await?;
        }

        self.commit(&begun.deployment_id).await?;

        listener.on_progress(
            70,
            &format!("Verifying availability of {}", app.app_id()),
        );
        let details = self
            .verify_availability(&begun.deployment_id, listener)
            .await?;

        listener.on_progress(90, "Updating datastore");
        listener.on_progress(95, "Uploading index definitions");
        self.upload_index(&begun.deployment_id, app).await?;

        if let Err(e) = fs::remove_dir_all(&staging) {
            warn!("unable to remove staging directory {}: {e}", staging.display());
        }

        Ok(SuccessEvent { details })
    }
}

#[async_trait]
impl AppDeployer for AdminClient {
    async fn update(&self, app: Application, listener: &mut DeployListener) {
        match self.run_update(&app, listener).await {
            Ok(event) => listener.on_success(event),
            Err(event) => listener.on_failure(event),
        }
    }
}

/// Copy the manifest files into a fresh staging directory.
fn stage_archive(app: &Application) -> std::io::Result<PathBuf> {
    let staging = std::env::temp_dir().join(format!("gantry-staging-{}", generate_uuid()));
    for entry in app.manifest() {
        let dst = staging.join(&entry.path);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(app.root().join(&entry.path), &dst)?;
    }
    Ok(staging)
}

fn transport_failure(context: &str, err: reqwest::Error) -> FailureEvent {
    FailureEvent {
        message: format!("Deployment failed: {context}: {err}"),
        cause: Some(FailureCause::Transport),
        details: None,
    }
}

fn remote_failure(state: DeploymentState) -> FailureEvent {
    match state.error {
        Some(error) => {
            let cause = match error.category.as_deref() {
                Some("compilation") => Some(FailureCause::Compilation),
                _ => Some(FailureCause::Rejected),
            };
            FailureEvent {
                message: format!("Deployment failed: {}", error.message),
                cause,
                details: error.details,
            }
        }
        None => FailureEvent {
            message: "Deployment failed: rollout reported as failed".into(),
            cause: Some(FailureCause::Rejected),
            details: state.details,
        },
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T, FailureEvent> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FailureEvent {
            message: format!("Deployment failed: {context}: {status} - {body}"),
            cause: Some(FailureCause::Rejected),
            details: None,
        });
    }
    response.json().await.map_err(|e| FailureEvent {
        message: format!("Deployment failed: malformed admin response: {e}"),
        cause: Some(FailureCause::Transport),
        details: None,
    })
}

async fn parse_unit_response(
    response: reqwest::Response,
    context: &str,
) -> Result<(), FailureEvent> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FailureEvent {
            message: format!("Deployment failed: {context}: {status} - {body}"),
            cause: Some(FailureCause::Rejected),
            details: None,
        });
    }
    Ok(())
}

#[derive(Serialize)]
struct BeginDeploymentRequest<'a> {
    manifest: &'a [ManifestEntry],
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct BeginDeploymentResponse {
    deployment_id: String,

    /// Digests the service does not already have and needs uploaded
    #[serde(default)]
    missing: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DeploymentState {
    state: String,

    #[serde(default)]
    details: Option<String>,

    #[serde(default)]
    error: Option<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    message: String,

    #[serde(default)]
    category: Option<String>,

    #[serde(default)]
    details: Option<String>,
}
