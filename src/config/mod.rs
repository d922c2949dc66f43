//! Configuration module for the reconciler.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the `bbrec.yaml` manifest
//! - Validating declared resources against their schemas
//! - Reading provider credentials from the environment

mod manifest;
mod parser;
mod provider;
mod validator;

pub use manifest::{DEFAULT_STATE_FILE, Manifest, ResourceDecl, StateConfig, TimeoutOverrides};
pub use parser::{DEFAULT_MANIFEST_FILES, ManifestParser, find_manifest_file};
pub use provider::{DEFAULT_API_URL, ProviderConfig, vars};
pub use validator::{ManifestValidator, ValidationError, ValidationResult};
