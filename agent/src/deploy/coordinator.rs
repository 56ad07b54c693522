//! Deployment coordinator
//!
//! Submits one rollout to a background task and gives the caller a
//! bounded, re-checking wait on the terminal status. The background
//! execution is fire-and-forget past submission: neither a timeout nor a
//! cancelled wait stops it.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::app::options::DeployOptions;
use crate::deploy::listener::{DeployListener, OutputSink, TerminalStatus};
use crate::deploy::target::{DeployTarget, TargetResolver, APP_DOMAIN};
use crate::deploy::AppDeployer;
use crate::errors::AgentError;
use crate::models::application::Application;
use crate::sdk::info::SdkInfo;
use crate::sdk::update_check::UpdateCheck;

/// Coordinates a single deployment attempt end to end.
///
/// `deploy` takes `&mut self`, so one coordinator instance can have at
/// most one rollout in flight.
pub struct Coordinator<D: AppDeployer, R: TargetResolver> {
    deployer: Arc<D>,
    resolver: R,
    sdk: SdkInfo,
    options: DeployOptions,
    update_check: Option<UpdateCheck>,
}

impl<D: AppDeployer, R: TargetResolver> Coordinator<D, R> {
    pub fn new(deployer: Arc<D>, resolver: R, sdk: SdkInfo, options: DeployOptions) -> Self {
        Self {
            deployer,
            resolver,
            sdk,
            options,
            update_check: None,
        }
    }

    /// Attach an advisory SDK update check, run before each rollout.
    pub fn with_update_check(mut self, check: UpdateCheck) -> Self {
        self.update_check = Some(check);
        self
    }

    /// Deploy `archive`, waiting up to the configured startup timeout.
    pub async fn deploy(&mut self, archive: &Path) -> Result<DeployTarget, AgentError> {
        self.deploy_with_sink(
            archive,
            OutputSink::stdio(),
            Box::pin(futures::future::pending::<()>()),
        )
        .await
    }

    /// Deploy with a cooperative cancel signal for the waiting caller.
    ///
    /// Cancellation abandons the wait only; the rollout keeps running in
    /// the background.
    pub async fn deploy_until(
        &mut self,
        archive: &Path,
        shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<DeployTarget, AgentError> {
        self.deploy_with_sink(archive, OutputSink::stdio(), shutdown_signal)
            .await
    }

    /// Deploy with explicit console sinks, for callers that capture output.
    pub async fn deploy_with_sink(
        &mut self,
        archive: &Path,
        sink: OutputSink,
        mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<DeployTarget, AgentError> {
        if let Some(check) = &self.update_check {
            check.maybe_notify().await;
        }

        let app = Application::read(archive, &self.sdk).map_err(translate_schema_error)?;
        info!(app_id = %app.app_id(), version = %app.version(), "submitting deployment");

        let (mut listener, status_rx) = DeployListener::new(sink);
        let deployer = Arc::clone(&self.deployer);
        let worker_app = app.clone();
        tokio::spawn(async move {
            deployer.update(worker_app, &mut listener).await;
        });

        let status = self.await_terminal(status_rx, &mut shutdown_signal).await?;

        match status {
            TerminalStatus::Succeeded => {
                let id = format!("{}.{}", app.version(), app.app_id());
                let hostname = format!("{id}.{APP_DOMAIN}");
                let target = self.resolver.resolve(&hostname, self.options.port, &app)?;
                info!(%hostname, port = self.options.port, "deployment succeeded");
                Ok(target)
            }
            TerminalStatus::Failed(reason) => Err(AgentError::DeployFailed(reason)),
            TerminalStatus::Pending => Err(AgentError::Internal(
                "deployment wait returned without a terminal status".into(),
            )),
        }
    }

    /// Wait for the status to leave `Pending`, bounded by the startup
    /// timeout.
    ///
    /// The exit condition is the observed state, not the wake signal: the
    /// watch channel retains the latest value, so a signal that landed
    /// before the wait began is still seen, and a wake without a state
    /// change re-enters the wait against the same deadline.
    async fn await_terminal(
        &self,
        mut status_rx: watch::Receiver<TerminalStatus>,
        shutdown_signal: &mut Pin<Box<dyn Future<Output = ()> + Send>>,
    ) -> Result<TerminalStatus, AgentError> {
        let deadline = Instant::now() + self.options.startup_timeout;

        loop {
            let status = status_rx.borrow_and_update().clone();
            if status.is_terminal() {
                return Ok(status);
            }

            tokio::select! {
                _ = shutdown_signal.as_mut() => {
                    warn!("deployment wait interrupted; rollout continues in the background");
                    return Err(AgentError::Interrupted);
                }
                changed = tokio::time::timeout_at(deadline, status_rx.changed()) => {
                    match changed {
                        Ok(Ok(())) => {}
                        Ok(Err(_)) => {
                            // Worker dropped the listener without a terminal
                            // event; the execution is over, so this is a
                            // failure rather than a timeout.
                            let status = status_rx.borrow().clone();
                            if status.is_terminal() {
                                return Ok(status);
                            }
                            return Err(AgentError::DeployFailed(
                                "deployment worker exited without reporting a terminal status"
                                    .into(),
                            ));
                        }
                        Err(_) => {
                            // Deadline hit; a terminal status that raced the
                            // timer still wins.
                            let status = status_rx.borrow().clone();
                            if status.is_terminal() {
                                return Ok(status);
                            }
                            return Err(AgentError::DeployTimeout(self.options.startup_timeout));
                        }
                    }
                }
            }
        }
    }
}

/// A missing backends schema document surfaces as an ordinary config
/// validation failure; give it an actionable message instead.
fn translate_schema_error(err: AgentError) -> AgentError {
    if let AgentError::ConfigError(msg) = &err {
        if msg.contains("Failed to read schema document") && msg.contains("backends") {
            return AgentError::SdkTooOld(
                "deploying an application with backends requires Gantry SDK 1.5.0 or greater"
                    .into(),
            );
        }
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::target::HttpTargetResolver;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoopDeployer;

    #[async_trait]
    impl AppDeployer for NoopDeployer {
        async fn update(&self, _app: Application, _listener: &mut DeployListener) {}
    }

    fn test_coordinator(timeout: Duration) -> Coordinator<NoopDeployer, HttpTargetResolver> {
        let sdk = SdkInfo::new(std::env::temp_dir()).unwrap();
        Coordinator::new(
            Arc::new(NoopDeployer),
            HttpTargetResolver,
            sdk,
            DeployOptions {
                startup_timeout: timeout,
                ..DeployOptions::default()
            },
        )
    }

    fn never() -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(futures::future::pending::<()>())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_survives_spurious_wakeups() {
        let coordinator = test_coordinator(Duration::from_secs(10));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);

        tokio::spawn(async move {
            // Wake the waiter repeatedly without a state change.
            for _ in 0..5 {
                tokio::time::sleep(Duration::from_millis(100)).await;
                tx.send(TerminalStatus::Pending).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(TerminalStatus::Succeeded).unwrap();
        });

        let status = coordinator.await_terminal(rx, &mut never()).await.unwrap();
        assert_eq!(status, TerminalStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_times_out_only_after_the_full_duration() {
        let coordinator = test_coordinator(Duration::from_secs(2));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);

        let started = Instant::now();
        let err = coordinator.await_terminal(rx, &mut never()).await.unwrap_err();
        assert!(matches!(err, AgentError::DeployTimeout(_)));
        assert!(started.elapsed() >= Duration::from_secs(2));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_status_set_before_the_wait_is_observed() {
        let coordinator = test_coordinator(Duration::from_secs(2));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);

        // Signal lands before the wait begins.
        tx.send(TerminalStatus::Failed("boom".into())).unwrap();

        let status = coordinator.await_terminal(rx, &mut never()).await.unwrap();
        assert_eq!(status, TerminalStatus::Failed("boom".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn status_racing_the_deadline_beats_the_timeout() {
        let coordinator = test_coordinator(Duration::from_secs(2));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1999)).await;
            tx.send(TerminalStatus::Succeeded).unwrap();
        });

        let status = coordinator.await_terminal(rx, &mut never()).await.unwrap();
        assert_eq!(status, TerminalStatus::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn worker_exit_without_terminal_status_is_a_failure() {
        let coordinator = test_coordinator(Duration::from_secs(10));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);
        drop(tx);

        let err = coordinator.await_terminal(rx, &mut never()).await.unwrap_err();
        assert!(matches!(err, AgentError::DeployFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_signal_interrupts_the_wait() {
        let coordinator = test_coordinator(Duration::from_secs(10));
        let (tx, rx) = watch::channel(TerminalStatus::Pending);

        let mut signal: Pin<Box<dyn Future<Output = ()> + Send>> =
            Box::pin(tokio::time::sleep(Duration::from_millis(50)));
        let err = coordinator.await_terminal(rx, &mut signal).await.unwrap_err();
        assert!(matches!(err, AgentError::Interrupted));
        drop(tx);
    }

    #[test]
    fn backends_schema_error_is_translated() {
        let err = AgentError::ConfigError(
            "Failed to read schema document /sdk/schemas/backends.schema.json: not found".into(),
        );
        assert!(matches!(translate_schema_error(err), AgentError::SdkTooOld(_)));
    }

    #[test]
    fn other_schema_errors_propagate_unchanged() {
        let err = AgentError::ConfigError(
            "Failed to read schema document /sdk/schemas/cron.schema.json: not found".into(),
        );
        match translate_schema_error(err) {
            AgentError::ConfigError(msg) => assert!(msg.contains("cron.schema.json")),
            other => panic!("expected ConfigError, got {other:?}"),
        }

        let unrelated = AgentError::DeployFailed("backends".into());
        assert!(matches!(
            translate_schema_error(unrelated),
            AgentError::DeployFailed(_)
        ));
    }
}
