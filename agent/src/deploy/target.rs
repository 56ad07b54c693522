//! Deployment target resolution

use url::Url;

use crate::errors::AgentError;
use crate::models::application::Application;

/// Domain under which deployed applications are served.
pub const APP_DOMAIN: &str = "gantryapps.io";

/// Reachable endpoint for a completed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployTarget {
    pub hostname: String,
    pub port: u16,
    pub base_url: Url,
}

impl DeployTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

/// Turns a completed deployment into a connectable endpoint descriptor.
pub trait TargetResolver: Send + Sync {
    fn resolve(
        &self,
        hostname: &str,
        port: u16,
        app: &Application,
    ) -> Result<DeployTarget, AgentError>;
}

/// Default resolver: plain HTTP on the configured port.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTargetResolver;

impl TargetResolver for HttpTargetResolver {
    fn resolve(
        &self,
        hostname: &str,
        port: u16,
        _app: &Application,
    ) -> Result<DeployTarget, AgentError> {
        let base_url = Url::parse(&format!("http://{hostname}:{port}/")).map_err(|e| {
            AgentError::ConfigError(format!("invalid endpoint {hostname}:{port}: {e}"))
        })?;
        Ok(DeployTarget {
            hostname: hostname.to_string(),
            port,
            base_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::info::SdkInfo;

    #[test]
    fn resolver_builds_an_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(Application::DESCRIPTOR_FILE),
            r#"{"app_id": "orders", "version": "v3"}"#,
        )
        .unwrap();
        let sdk_dir = tempfile::tempdir().unwrap();
        let sdk = SdkInfo::new(sdk_dir.path()).unwrap();
        let app = Application::read(dir.path(), &sdk).unwrap();

        let target = HttpTargetResolver
            .resolve(&format!("v3.orders.{APP_DOMAIN}"), 8080, &app)
            .unwrap();

        assert_eq!(target.address(), format!("v3.orders.{APP_DOMAIN}:8080"));
        assert_eq!(
            target.base_url.as_str(),
            format!("http://v3.orders.{APP_DOMAIN}:8080/")
        );
    }
}
