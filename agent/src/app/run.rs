//! Top-level deployment run

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use secrecy::ExposeSecret;
use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::coordinator::Coordinator;
use crate::deploy::target::HttpTargetResolver;
use crate::errors::AgentError;
use crate::sdk::admin::{AdminClient, ConnectOptions};
use crate::sdk::info::SdkInfo;
use crate::sdk::update_check::UpdateCheck;

/// Validate the settings the deployment core depends on.
///
/// Fails fast, before any deployment work starts.
pub fn validate(options: &AppOptions) -> Result<(), AgentError> {
    if options.sdk.root.as_os_str().is_empty() {
        return Err(AgentError::ConfigError("SDK root is not set".into()));
    }
    if options.credentials.user_id.is_empty() {
        return Err(AgentError::ConfigError("user id is not set".into()));
    }
    if options.credentials.password.expose_secret().is_empty() {
        return Err(AgentError::ConfigError("password is not set".into()));
    }
    Ok(())
}

/// Deploy the archive at `archive` and print the resolved endpoint.
pub async fn run(
    options: AppOptions,
    archive: PathBuf,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    validate(&options)?;

    let sdk = SdkInfo::new(&options.sdk.root)?;
    let server = options.sdk.server();
    info!(server = %server, "using admin server");

    let admin = AdminClient::new(ConnectOptions {
        server: server.clone(),
        user_id: options.credentials.user_id.clone(),
        password: options.credentials.password.clone(),
    })?;

    let mut coordinator = Coordinator::new(
        Arc::new(admin),
        HttpTargetResolver,
        sdk.clone(),
        options.deploy.clone(),
    );
    if options.deploy.update_check {
        coordinator = coordinator.with_update_check(UpdateCheck::new(sdk, server)?);
    }

    let target = coordinator
        .deploy_until(&archive, Box::pin(shutdown_signal))
        .await?;

    println!(
        "{}",
        format!("Application available at {}", target.base_url)
            .green()
            .bold()
    );
    Ok(())
}
