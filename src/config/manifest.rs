//! Manifest types for `bbrec.yaml`.
//!
//! A manifest lists the resources that should exist. Attributes stay as raw
//! YAML here; they are checked against the resource kind's schema when the
//! manifest is validated or applied.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::diag::Diagnostics;
use crate::resources::ResourceKind;
use crate::schema::{Attributes, Operation, Timeouts, declared_attributes};

/// Default state file, relative to the manifest.
pub const DEFAULT_STATE_FILE: &str = ".bbrec/state.json";

/// Root of a manifest file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Where state is persisted.
    #[serde(default)]
    pub state: StateConfig,
    /// Declared resources.
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

/// State location.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// State file path, relative to the manifest directory.
    #[serde(default)]
    pub path: Option<String>,
}

/// One declared resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDecl {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Local name, unique within the manifest.
    pub name: String,
    /// Declared attribute values.
    #[serde(default = "empty_mapping")]
    pub attributes: serde_yaml::Value,
    /// Per-operation timeout overrides.
    #[serde(default)]
    pub timeouts: TimeoutOverrides,
}

/// Timeout overrides in seconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutOverrides {
    /// Create timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create: Option<u64>,
    /// Read timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<u64>,
    /// Update timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<u64>,
    /// Delete timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<u64>,
}

fn empty_mapping() -> serde_yaml::Value {
    serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
}

impl Manifest {
    /// Resolves the state file against the manifest directory.
    #[must_use]
    pub fn state_path(&self, base: &Path) -> PathBuf {
        base.join(self.state.path.as_deref().unwrap_or(DEFAULT_STATE_FILE))
    }

    /// Looks up a declared resource by name.
    #[must_use]
    pub fn resource(&self, name: &str) -> Option<&ResourceDecl> {
        self.resources.iter().find(|r| r.name == name)
    }
}

impl ResourceDecl {
    /// Converts the raw attributes into typed values for this kind.
    #[must_use]
    pub fn declared(&self) -> (Attributes, Diagnostics) {
        declared_attributes(self.kind.schema(), &self.attributes)
    }

    /// Timeouts for this resource: overrides on top of `base`.
    #[must_use]
    pub fn timeouts(&self, base: Timeouts) -> Timeouts {
        [
            (Operation::Create, self.timeouts.create),
            (Operation::Read, self.timeouts.read),
            (Operation::Update, self.timeouts.update),
            (Operation::Delete, self.timeouts.delete),
        ]
        .into_iter()
        .fold(base, |acc, (op, secs)| match secs {
            Some(secs) => acc.with(op, Duration::from_secs(secs)),
            None => acc,
        })
    }
}

impl TimeoutOverrides {
    /// Overrides that are present, with their operation name.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> {
        [
            ("create", self.create),
            ("read", self.read),
            ("update", self.update),
            ("delete", self.delete),
        ]
        .into_iter()
        .filter_map(|(name, secs)| secs.map(|s| (name, s)))
    }
}
