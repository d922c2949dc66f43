//! Manifest loading.
//!
//! Reads the YAML manifest from disk and loads a `.env` file sitting next to
//! it, so credentials can live alongside the declaration.

use crate::error::{ConfigError, ReconcileError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::manifest::Manifest;

/// Loader for manifest files.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Directory the `.env` file is looked up in.
    base_path: Option<PathBuf>,
}

impl ManifestParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory used to resolve `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(ReconcileError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconcileError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        debug!("Parsing YAML manifest");

        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ReconcileError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed manifest with {} resources", manifest.resources.len());
        Ok(manifest)
    }

    /// Loads the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ReconcileError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Manifest file names searched for, in order.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["bbrec.yaml", "bbrec.yml", "brightbox.yaml"];

/// Finds the manifest in `start_dir` or one of its parents.
///
/// # Errors
///
/// Returns an error if no manifest is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let candidate = current.join(filename);
            if candidate.exists() {
                info!("Found manifest: {}", candidate.display());
                return Ok(candidate);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ReconcileError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;

    #[test]
    fn test_parse_manifest() {
        let yaml = r"
state:
  path: state/prod.json
resources:
  - kind: cloud_ip
    name: web-ip
    attributes:
      name: web
      mode: nat
      target: int-12345
      port_translator:
        - { incoming: 80, outgoing: 8080, protocol: tcp }
    timeouts:
      create: 120
  - kind: api_client
    name: ci
    attributes:
      name: ci
      permissions_group: storage
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(manifest.state.path.as_deref(), Some("state/prod.json"));
        assert_eq!(manifest.resources.len(), 2);
        assert_eq!(manifest.resources[0].kind, ResourceKind::CloudIp);
        assert_eq!(manifest.resources[0].timeouts.create, Some(120));
        assert_eq!(manifest.resources[1].kind, ResourceKind::ApiClient);
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let yaml = "resources:\n  - kind: server\n    name: web\n";
        let err = ManifestParser::new().parse_yaml(yaml, None).unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Config(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_load_file_and_find() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("env/prod");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("bbrec.yaml"), "resources: []\n").unwrap();

        let found = find_manifest_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("bbrec.yaml"));

        let manifest = ManifestParser::new().load_file(&found).unwrap();
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ManifestParser::new()
            .load_file(dir.path().join("bbrec.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
