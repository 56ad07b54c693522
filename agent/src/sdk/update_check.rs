//! Best-effort SDK update notices
//!
//! Advisory only: the check runs before a rollout when enabled, and every
//! failure inside it is logged and swallowed so it can never block or
//! fail a deployment.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::errors::AgentError;
use crate::sdk::info::SdkInfo;

/// Checks the admin server for a newer SDK release.
pub struct UpdateCheck {
    client: reqwest::Client,
    server: String,
    sdk: SdkInfo,
}

impl UpdateCheck {
    pub fn new(sdk: SdkInfo, server: impl Into<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            server: server.into().trim_end_matches('/').to_string(),
            sdk,
        })
    }

    /// Print an upgrade notice when the installed SDK lags the server.
    pub async fn maybe_notify(&self) {
        if let Err(e) = self.check().await {
            debug!("SDK update check failed: {e}");
        }
    }

    async fn check(&self) -> Result<(), AgentError> {
        let installed = self.sdk.version()?;

        let url = format!("{}/api/sdk/latest", self.server);
        debug!("GET {}", url);
        let latest: LatestSdk = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if is_newer(&latest.version, &installed) {
            info!(%installed, latest = %latest.version, "a newer Gantry SDK is available");
            println!("****************************************************");
            println!("A new version of the Gantry SDK is available: {}", latest.version);
            println!("Your version: {installed}");
            println!("Visit https://gantry.io/sdk to download the latest.");
            println!("****************************************************");
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct LatestSdk {
    version: String,
}

/// Dotted-version comparison; non-numeric components count as zero.
fn is_newer(candidate: &str, installed: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let candidate = parse(candidate);
    let installed = parse(installed);

    for i in 0..candidate.len().max(installed.len()) {
        let c = candidate.get(i).copied().unwrap_or(0);
        let l = installed.get(i).copied().unwrap_or(0);
        if c != l {
            return c > l;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_versions_compare_greater() {
        assert!(is_newer("1.6.0", "1.5.9"));
        assert!(is_newer("2.0", "1.9.9"));
        assert!(is_newer("1.5.1", "1.5"));
    }

    #[test]
    fn equal_and_older_versions_do_not() {
        assert!(!is_newer("1.5.0", "1.5.0"));
        assert!(!is_newer("1.5.0", "1.5"));
        assert!(!is_newer("1.4.9", "1.5.0"));
    }

    #[test]
    fn junk_components_count_as_zero() {
        assert!(is_newer("1.1", "1.x"));
        assert!(!is_newer("1.x", "1.0"));
    }
}
