//! Application archive models

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;
use crate::sdk::info::SdkInfo;
use crate::utils::sha256_hash;

/// Application descriptor, read from `gantry.json` in the archive root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDescriptor {
    /// Application identifier on the platform
    pub app_id: String,

    /// Version label for this rollout
    pub version: String,

    /// Optional background-backends section; requires schema support in
    /// the installed SDK
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backends: Option<serde_json::Value>,
}

/// One file in the upload manifest. The admin service addresses files by
/// content digest, so the digest is computed up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path relative to the archive root, '/'-separated
    pub path: String,

    /// SHA-256 of the file contents, lowercase hex
    pub sha256: String,

    /// File size in bytes
    pub size: u64,
}

/// Deployer-ready representation of an exploded application archive.
#[derive(Debug, Clone)]
pub struct Application {
    root: PathBuf,
    descriptor: AppDescriptor,
    manifest: Vec<ManifestEntry>,
}

impl Application {
    /// Descriptor file name within the archive root
    pub const DESCRIPTOR_FILE: &'static str = "gantry.json";

    /// Read an exploded archive into its deployer-ready representation.
    ///
    /// Validates the descriptor and, when the application declares
    /// backends, the presence of the backends schema document in the SDK.
    pub fn read(root: &Path, sdk: &SdkInfo) -> Result<Self, AgentError> {
        if !root.is_dir() {
            return Err(AgentError::ArchiveError(format!(
                "archive {} is not a directory",
                root.display()
            )));
        }

        let descriptor_path = root.join(Self::DESCRIPTOR_FILE);
        let raw = fs::read_to_string(&descriptor_path).map_err(|e| {
            AgentError::ArchiveError(format!(
                "unable to read {}: {e}",
                descriptor_path.display()
            ))
        })?;
        let descriptor: AppDescriptor = serde_json::from_str(&raw)?;

        if descriptor.app_id.is_empty() {
            return Err(AgentError::ConfigError("app_id must not be empty".into()));
        }
        if descriptor.version.is_empty() {
            return Err(AgentError::ConfigError("version must not be empty".into()));
        }
        validate_backends(&descriptor, sdk)?;

        let manifest = build_manifest(root)?;

        Ok(Self {
            root: root.to_path_buf(),
            descriptor,
            manifest,
        })
    }

    pub fn app_id(&self) -> &str {
        &self.descriptor.app_id
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    pub fn has_backends(&self) -> bool {
        self.descriptor.backends.is_some()
    }
}

/// Backends config is validated against a schema document shipped with
/// the SDK. Older SDKs ship without it, which readers upstream translate
/// into an actionable upgrade message.
fn validate_backends(descriptor: &AppDescriptor, sdk: &SdkInfo) -> Result<(), AgentError> {
    if descriptor.backends.is_none() {
        return Ok(());
    }

    let schema = sdk.schema_dir().join("backends.schema.json");
    let raw = fs::read_to_string(&schema).map_err(|e| {
        AgentError::ConfigError(format!(
            "Failed to read schema document {}: {e}",
            schema.display()
        ))
    })?;
    serde_json::from_str::<serde_json::Value>(&raw).map_err(|e| {
        AgentError::ConfigError(format!(
            "Failed to read schema document {}: {e}",
            schema.display()
        ))
    })?;

    Ok(())
}

fn build_manifest(root: &Path) -> Result<Vec<ManifestEntry>, AgentError> {
    let mut entries = Vec::new();
    collect_files(root, root, &mut entries)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<ManifestEntry>,
) -> Result<(), AgentError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let data = fs::read(&path)?;
            let rel = path.strip_prefix(root).map_err(|_| {
                AgentError::Internal(format!("{} escapes the archive root", path.display()))
            })?;
            out.push(ManifestEntry {
                path: rel.to_string_lossy().replace('\\', "/"),
                sha256: sha256_hash(&data),
                size: data.len() as u64,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sdk_with_schemas(backends: bool) -> (tempfile::TempDir, SdkInfo) {
        let dir = tempfile::tempdir().unwrap();
        if backends {
            let schemas = dir.path().join("schemas");
            fs::create_dir_all(&schemas).unwrap();
            fs::write(schemas.join("backends.schema.json"), "{}").unwrap();
        }
        let sdk = SdkInfo::new(dir.path()).unwrap();
        (dir, sdk)
    }

    fn archive_with(descriptor: &str, files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(Application::DESCRIPTOR_FILE), descriptor).unwrap();
        for (path, contents) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, contents).unwrap();
        }
        dir
    }

    #[test]
    fn read_builds_a_digest_manifest() {
        let (_sdk_dir, sdk) = sdk_with_schemas(false);
        let archive = archive_with(
            r#"{"app_id": "orders", "version": "v3"}"#,
            &[("index.html", "hello"), ("static/app.js", "console.log(1)")],
        );

        let app = Application::read(archive.path(), &sdk).unwrap();

        assert_eq!(app.app_id(), "orders");
        assert_eq!(app.version(), "v3");
        assert!(!app.has_backends());

        let paths: Vec<&str> = app.manifest().iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["gantry.json", "index.html", "static/app.js"]);

        let index = &app.manifest()[1];
        assert_eq!(index.size, 5);
        assert_eq!(index.sha256.len(), 64);
    }

    #[test]
    fn read_rejects_a_missing_descriptor() {
        let (_sdk_dir, sdk) = sdk_with_schemas(false);
        let dir = tempfile::tempdir().unwrap();

        let err = Application::read(dir.path(), &sdk).unwrap_err();
        assert!(matches!(err, AgentError::ArchiveError(_)));
    }

    #[test]
    fn read_rejects_empty_identifiers() {
        let (_sdk_dir, sdk) = sdk_with_schemas(false);
        let archive = archive_with(r#"{"app_id": "", "version": "v1"}"#, &[]);

        let err = Application::read(archive.path(), &sdk).unwrap_err();
        assert!(matches!(err, AgentError::ConfigError(_)));
    }

    #[test]
    fn backends_require_the_schema_document() {
        let (_sdk_dir, sdk) = sdk_with_schemas(false);
        let archive = archive_with(
            r#"{"app_id": "orders", "version": "v3", "backends": [{"name": "worker"}]}"#,
            &[],
        );

        let err = Application::read(archive.path(), &sdk).unwrap_err();
        match err {
            AgentError::ConfigError(msg) => {
                assert!(msg.contains("Failed to read schema document"));
                assert!(msg.contains("backends"));
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn backends_validate_against_a_present_schema() {
        let (_sdk_dir, sdk) = sdk_with_schemas(true);
        let archive = archive_with(
            r#"{"app_id": "orders", "version": "v3", "backends": [{"name": "worker"}]}"#,
            &[],
        );

        let app = Application::read(archive.path(), &sdk).unwrap();
        assert!(app.has_backends());
    }
}
