//! Persisted state types.
//!
//! One [`ResourceState`] per declared resource holds the remote identifier
//! and the last known attributes, keyed by the resource's manifest name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::{StateError, Result};
use crate::resources::ResourceKind;
use crate::schema::{Attributes, InstanceState};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept.
const MAX_HISTORY: usize = 50;

/// Everything the reconciler knows about the remote side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileState {
    /// State format version.
    pub version: String,
    /// Tracked resources by manifest name.
    pub resources: BTreeMap<String, ResourceState>,
    /// SHA-256 of the serialized resources, hex encoded.
    #[serde(default)]
    pub checksum: String,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent operations.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One tracked resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Manifest name.
    pub name: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Remote identifier.
    pub id: String,
    /// Last known attribute values.
    #[serde(default)]
    pub attributes: Attributes,
    /// When the resource was first recorded.
    pub created_at: DateTime<Utc>,
    /// When the resource was last written.
    pub updated_at: DateTime<Utc>,
}

/// A single entry in the operation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the operation finished.
    pub timestamp: DateTime<Utc>,
    /// Which command ran.
    pub operation: StateOperation,
    /// Resources affected.
    pub resources: Vec<String>,
    /// Whether every resource succeeded.
    pub success: bool,
    /// Summary of the failures, if any.
    #[serde(default)]
    pub error: Option<String>,
}

/// Commands recorded in the history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateOperation {
    /// Declared resources were reconciled.
    Apply,
    /// Tracked resources were re-read.
    Refresh,
    /// Tracked resources were deleted.
    Destroy,
}

impl ReconcileState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            resources: BTreeMap::new(),
            checksum: String::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Gets a resource by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResourceState> {
        self.resources.get(name)
    }

    /// Records a resource snapshot, keeping its creation time if known.
    pub fn record(&mut self, name: &str, kind: ResourceKind, instance: InstanceState) {
        let now = Utc::now();
        let created_at = self.resources.get(name).map_or(now, |r| r.created_at);
        self.resources.insert(
            name.to_string(),
            ResourceState {
                name: name.to_string(),
                kind,
                id: instance.id,
                attributes: instance.attributes,
                created_at,
                updated_at: now,
            },
        );
        self.last_updated = now;
    }

    /// Removes a resource by name.
    pub fn remove(&mut self, name: &str) -> Option<ResourceState> {
        let result = self.resources.remove(name);
        if result.is_some() {
            self.last_updated = Utc::now();
        }
        result
    }

    /// Returns all tracked names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    /// Adds a history entry, dropping the oldest beyond the limit.
    pub fn add_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }

    /// Computes the checksum of the tracked resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the resources cannot be serialized.
    pub fn compute_checksum(&self) -> Result<String> {
        let json = serde_json::to_vec(&self.resources)
            .map_err(|e| StateError::serialization(format!("Failed to hash state: {e}")))?;
        Ok(hex::encode(Sha256::digest(&json)))
    }

    /// Stores the current checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the resources cannot be serialized.
    pub fn seal(&mut self) -> Result<()> {
        self.checksum = self.compute_checksum()?;
        Ok(())
    }

    /// Checks the version and, when present, the checksum.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::VersionMismatch`] or [`StateError::Corrupted`].
    pub fn verify(&self) -> Result<()> {
        if self.version != STATE_VERSION {
            return Err(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: self.version.clone(),
            }
            .into());
        }
        if !self.checksum.is_empty() && self.checksum != self.compute_checksum()? {
            return Err(StateError::Corrupted {
                message: String::from("checksum does not match the recorded resources"),
            }
            .into());
        }
        Ok(())
    }
}

impl Default for ReconcileState {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceState {
    /// Snapshot handed to a lifecycle call.
    #[must_use]
    pub fn instance(&self) -> InstanceState {
        InstanceState {
            id: self.id.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl HistoryEntry {
    /// Creates a history entry; failures are summarised in `error`.
    #[must_use]
    pub fn new(operation: StateOperation, resources: Vec<String>, error: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            resources,
            success: error.is_none(),
            error,
        }
    }
}

impl std::fmt::Display for StateOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Apply => "apply",
            Self::Refresh => "refresh",
            Self::Destroy => "destroy",
        };
        write!(f, "{op}")
    }
}
