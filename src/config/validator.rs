//! Manifest validation.
//!
//! Every problem in a manifest is collected before anything is reported, so
//! a user sees all of them in one run.

use crate::error::{ConfigError, ReconcileError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::manifest::{Manifest, ResourceDecl};

/// Validator for manifests.
#[derive(Debug, Default)]
pub struct ManifestValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Path of the field that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks a manifest and returns every problem found.
    #[must_use]
    pub fn validate(&self, manifest: &Manifest) -> ValidationResult {
        let mut result = ValidationResult::default();

        if manifest.state.path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            result.push("state.path", "State path cannot be empty");
        }

        if manifest.resources.is_empty() {
            result
                .warnings
                .push(String::from("Manifest declares no resources"));
        }

        let mut seen = HashSet::new();
        for (index, resource) in manifest.resources.iter().enumerate() {
            let prefix = format!("resources[{index}]");
            if !seen.insert(resource.name.as_str()) {
                result.push(
                    format!("{prefix}.name"),
                    format!("Duplicate resource name '{}'", resource.name),
                );
            }
            Self::validate_resource(&prefix, resource, &mut result);
        }

        if result.is_valid() {
            debug!("Manifest validation passed");
        } else {
            debug!("Manifest validation found {} errors", result.error_count());
        }
        result
    }

    fn validate_resource(prefix: &str, resource: &ResourceDecl, result: &mut ValidationResult) {
        if resource.name.is_empty() {
            result.push(format!("{prefix}.name"), "Resource name cannot be empty");
        } else if !is_valid_name(&resource.name) {
            result.push(
                format!("{prefix}.name"),
                format!(
                    "Resource name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    resource.name
                ),
            );
        }

        let (_, diags) = resource.declared();
        for diag in diags.errors() {
            let field = diag.attribute.as_ref().map_or_else(
                || format!("{prefix}.attributes"),
                |attr| format!("{prefix}.attributes.{attr}"),
            );
            let message = diag.detail.as_ref().map_or_else(
                || diag.summary.clone(),
                |detail| format!("{}: {detail}", diag.summary),
            );
            result.push(field, message);
        }

        for (operation, secs) in resource.timeouts.iter() {
            if secs == 0 {
                result.push(
                    format!("{prefix}.timeouts.{operation}"),
                    "Timeout must be at least 1 second",
                );
            }
        }
    }
}

/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Turns a failed result into a single error listing every problem.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when any error was found.
    pub fn into_result(self) -> Result<Self> {
        let Some(first) = self.errors.first() else {
            return Ok(self);
        };
        let message = self
            .errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ReconcileError::Config(ConfigError::ValidationError {
            message,
            field: Some(first.field.clone()),
        }))
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;

    fn validate(yaml: &str) -> ValidationResult {
        let manifest = ManifestParser::new().parse_yaml(yaml, None).unwrap();
        ManifestValidator::new().validate(&manifest)
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("web-ip"));
        assert!(is_valid_name("ci-123"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Web-Ip"));
        assert!(!is_valid_name("1-ip"));
        assert!(!is_valid_name("web_ip"));
        assert!(!is_valid_name("web-"));
        assert!(!is_valid_name("web--ip"));
    }

    #[test]
    fn test_valid_manifest() {
        let result = validate(
            "resources:\n  - kind: cloud_ip\n    name: web-ip\n    attributes: { name: web, target: int-12345 }\n",
        );
        assert!(result.is_valid(), "{:?}", result.errors);
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_empty_manifest_warns() {
        let result = validate("resources: []\n");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_reports_every_error() {
        let result = validate(
            r"
resources:
  - kind: cloud_ip
    name: web-ip
    attributes:
      mode: bridged
      target: cip-12345
      status: mapped
    timeouts:
      create: 0
  - kind: api_client
    name: web-ip
    attributes:
      colour: blue
",
        );

        let fields: Vec<&str> = result.errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"resources[0].attributes.mode"), "{fields:?}");
        assert!(fields.contains(&"resources[0].attributes.target"), "{fields:?}");
        assert!(fields.contains(&"resources[0].attributes.status"), "{fields:?}");
        assert!(fields.contains(&"resources[0].timeouts.create"), "{fields:?}");
        assert!(fields.contains(&"resources[1].name"), "{fields:?}");
        assert!(fields.contains(&"resources[1].attributes.colour"), "{fields:?}");

        let err = result.into_result().unwrap_err().to_string();
        assert!(err.contains("Duplicate resource name 'web-ip'"), "{err}");
        assert!(err.contains("resources[0].attributes.mode"), "{err}");
    }
}
