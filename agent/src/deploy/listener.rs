//! Progress listener for deployment updates
//!
//! Adapts the toolchain's three-event update surface into formatted
//! console output plus a write-once terminal status. The status is
//! carried by a watch channel whose send doubles as the wake signal for
//! the waiting coordinator.

use std::io::{self, Write};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::deploy::stages::StageTracker;

/// Terminal outcome of a deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TerminalStatus {
    /// No terminal event observed yet
    #[default]
    Pending,

    /// Toolchain reported the rollout as complete
    Succeeded,

    /// Toolchain reported an explicit failure
    Failed(String),
}

impl TerminalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminalStatus::Pending)
    }
}

/// Failure categories reported by the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// Server-side compilation of the uploaded application failed
    Compilation,

    /// The admin service rejected the deployment
    Rejected,

    /// Transport-level error talking to the admin service
    Transport,
}

/// Terminal failure event.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub message: String,

    /// Failure category, when the toolchain could classify it
    pub cause: Option<FailureCause>,

    /// Extended diagnostics; older toolchains omit this
    pub details: Option<String>,
}

/// Terminal success event.
#[derive(Debug, Clone, Default)]
pub struct SuccessEvent {
    /// Extended diagnostics; older toolchains omit this
    pub details: Option<String>,
}

/// Update events emitted by an [`AppDeployer`](crate::deploy::AppDeployer).
#[derive(Debug, Clone)]
pub enum UpdateEvent {
    Progress { percent: i32, message: String },
    Success(SuccessEvent),
    Failure(FailureEvent),
}

/// Console sinks for deployment output.
///
/// The primary sink carries the deployment console; the diagnostic sink
/// carries incidental toolchain chatter that should not clutter a
/// successful run.
pub struct OutputSink {
    primary: Box<dyn Write + Send>,
    diagnostic: Box<dyn Write + Send>,
}

impl OutputSink {
    pub fn new(primary: Box<dyn Write + Send>, diagnostic: Box<dyn Write + Send>) -> Self {
        Self { primary, diagnostic }
    }

    /// Primary output on stdout, diagnostics on stderr.
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    fn primary_line(&mut self, line: &str) {
        let _ = writeln!(self.primary, "{line}");
    }

    fn diagnostic_line(&mut self, line: &str) {
        let _ = writeln!(self.diagnostic, "{line}");
    }
}

/// Event sink handed to the deployer for a single rollout.
///
/// All three handlers run on the background worker that drives the
/// deployer; the worker invokes them strictly sequentially.
pub struct DeployListener {
    stages: StageTracker,
    sink: OutputSink,
    percent_done: i32,
    status_tx: watch::Sender<TerminalStatus>,
}

impl DeployListener {
    /// Create a listener plus the status receiver the coordinator waits on.
    pub fn new(sink: OutputSink) -> (Self, watch::Receiver<TerminalStatus>) {
        let (status_tx, status_rx) = watch::channel(TerminalStatus::Pending);
        let listener = Self {
            stages: StageTracker::new(),
            sink,
            percent_done: 0,
            status_tx,
        };
        (listener, status_rx)
    }

    /// Dispatch a single toolchain event.
    pub fn handle(&mut self, event: UpdateEvent) {
        match event {
            UpdateEvent::Progress { percent, message } => self.on_progress(percent, &message),
            UpdateEvent::Success(event) => self.on_success(event),
            UpdateEvent::Failure(event) => self.on_failure(event),
        }
    }

    pub fn on_progress(&mut self, percent: i32, message: &str) {
        // Percent reporting is not reliable across all rollout phases;
        // track it for telemetry only and drive the console from the text.
        let worked = percent - self.percent_done;
        self.percent_done += worked;
        debug!(percent = self.percent_done, worked, "deployment progress");

        if let Some(stage) = self.stages.classify(message) {
            debug!(stage = stage.task_header(), "entering deployment stage");
            self.sink.primary_line("");
            self.sink.primary_line(&format!("{}:", stage.header));
        }
        self.sink.primary_line(&format!("\t{message}"));
    }

    pub fn on_failure(&mut self, event: FailureEvent) {
        if !self.set_status(TerminalStatus::Failed(event.message.clone())) {
            warn!("ignoring failure event after a terminal status was already recorded");
            return;
        }

        self.sink.primary_line(&event.message);

        // Only surface extended details for compilation failures; other
        // causes carry everything in the message itself.
        if event.cause == Some(FailureCause::Compilation) {
            if let Some(details) = event.details {
                self.sink.primary_line(&details);
            }
        }
    }

    pub fn on_success(&mut self, event: SuccessEvent) {
        if !self.set_status(TerminalStatus::Succeeded) {
            warn!("ignoring success event after a terminal status was already recorded");
            return;
        }

        self.percent_done = 0;

        // Extended details on success are compiler/tooling chatter; keep
        // them off the deployment console.
        if let Some(details) = event.details {
            self.sink.diagnostic_line(&details);
        }

        self.sink.primary_line("");
        self.sink.primary_line("Deployment completed successfully");
    }

    /// Record the terminal status, write-once. Returns `false` when a
    /// terminal status was already set; the watch send itself wakes the
    /// coordinator.
    fn set_status(&self, status: TerminalStatus) -> bool {
        let mut first = false;
        self.status_tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = status;
            first = true;
            true
        });
        first
    }
}
