//! Deployment stage classification
//!
//! The Gantry toolchain reports rollout progress as free-text console
//! lines. The phases of a rollout always arrive in the same order, so
//! classification is a cursor over a fixed stage table rather than a
//! general parser: only the stage under the cursor is ever inspected,
//! and unexpected or out-of-order messages simply do not advance it.

/// A rollout stage and the console-message prefixes that announce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployStage {
    /// Header printed on the console when this stage begins
    pub header: &'static str,

    /// Header for the secondary progress surface; `None` falls back to `header`
    task_header: Option<&'static str>,

    /// Literal message prefixes that signal entry into this stage
    pub message_prefixes: &'static [&'static str],
}

impl DeployStage {
    /// Header for the secondary progress surface.
    pub fn task_header(&self) -> &'static str {
        self.task_header.unwrap_or(self.header)
    }
}

/// Rollout stages in the order the toolchain walks through them.
pub const DEPLOY_STAGES: &[DeployStage] = &[
    DeployStage {
        header: "Preparing to deploy",
        task_header: None,
        message_prefixes: &["Created staging directory", "Scanning files on local disk"],
    },
    DeployStage {
        header: "Deploying",
        task_header: None,
        message_prefixes: &["Uploading"],
    },
    DeployStage {
        header: "Verifying availability",
        task_header: Some("Verifying availability of"),
        message_prefixes: &["Will check again in 1 seconds."],
    },
    DeployStage {
        header: "Updating datastore",
        task_header: None,
        message_prefixes: &["Uploading index"],
    },
];

/// Cursor over [`DEPLOY_STAGES`].
///
/// The cursor wraps after the last stage, so an archive that rolls out
/// more than one service in a single run keeps classifying correctly.
/// It is never rewound.
#[derive(Debug, Default)]
pub struct StageTracker {
    cursor: usize,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match `message` against the current stage's prefixes.
    ///
    /// On the first prefix hit the cursor advances to the next stage and
    /// the *matched* stage is returned so the caller can print the header
    /// that was just entered. `None` leaves the cursor untouched; an
    /// unmatched message is a normal, silent case.
    pub fn classify(&mut self, message: &str) -> Option<&'static DeployStage> {
        let stage = &DEPLOY_STAGES[self.cursor];
        for prefix in stage.message_prefixes {
            if message.starts_with(prefix) {
                self.cursor = (self.cursor + 1) % DEPLOY_STAGES.len();
                return Some(stage);
            }
        }
        None
    }
}
