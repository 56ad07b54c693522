//! Deployment coordination

pub mod coordinator;
pub mod listener;
pub mod stages;
pub mod target;

use async_trait::async_trait;

use crate::deploy::listener::DeployListener;
use crate::models::application::Application;

/// Deployment toolchain seam.
///
/// The outcome is entirely event-driven: implementations report progress
/// and the terminal result exclusively through the listener, never
/// through a return value.
#[async_trait]
pub trait AppDeployer: Send + Sync + 'static {
    /// Drive the rollout of `app` to completion.
    async fn update(&self, app: Application, listener: &mut DeployListener);
}
