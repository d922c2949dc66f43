//! Local file-based state storage backend.
//!
//! State lives in a single JSON file written through a temporary file and a
//! rename. The lock is a sibling `state.lock` file.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result, StateError};

use super::lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
use super::store::StateStore;
use super::types::ReconcileState;

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Directory holding the state and lock files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a store for the given state file.
    #[must_use]
    pub fn with_state_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let base_dir = state_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.as_os_str().is_empty() && !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| StateError::write(format!("Failed to create state directory: {e}")))?;
        }
        Ok(())
    }

    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await.map_err(|e| {
            ReconcileError::State(StateError::Corrupted {
                message: format!("Failed to read lock file: {e}"),
            })
        })?;

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            ReconcileError::State(StateError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock_info))
    }

    async fn write_lock_file(&self, lock_info: &LockInfo) -> Result<()> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        let lock_failed = |e: std::io::Error| {
            ReconcileError::State(StateError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })
        };
        let mut file = fs::File::create(&self.lock_path).await.map_err(lock_failed)?;
        file.write_all(content.as_bytes()).await.map_err(lock_failed)?;
        file.sync_all().await.map_err(lock_failed)?;

        Ok(())
    }

    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await.map_err(|e| {
                ReconcileError::State(StateError::LockFailed {
                    message: format!("Failed to delete lock file: {e}"),
                })
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<ReconcileState>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path).await.map_err(|e| {
            ReconcileError::State(StateError::Corrupted {
                message: format!("Failed to read state file: {e}"),
            })
        })?;

        let state: ReconcileState = serde_json::from_str(&content).map_err(|e| {
            ReconcileError::State(StateError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })
        })?;
        state.verify()?;

        Ok(Some(state))
    }

    async fn save(&self, state: &ReconcileState) -> Result<()> {
        self.ensure_dir().await?;

        info!("Saving state to: {}", self.state_path.display());

        let mut sealed = state.clone();
        sealed.seal()?;
        let content = serde_json::to_string_pretty(&sealed)
            .map_err(|e| StateError::serialization(format!("Failed to serialize state: {e}")))?;

        let temp_path = self.state_path.with_extension("tmp");
        let write_failed = |e: std::io::Error| StateError::write(format!("{}: {e}", temp_path.display()));

        let mut file = fs::File::create(&temp_path).await.map_err(write_failed)?;
        file.write_all(content.as_bytes()).await.map_err(write_failed)?;
        file.sync_all().await.map_err(write_failed)?;

        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| StateError::write(format!("Failed to rename state file: {e}")))?;

        debug!("State saved successfully");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path)
                .await
                .map_err(|e| StateError::write(format!("Failed to delete state file: {e}")))?;
        }
        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(ReconcileError::State(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }));
            }
            warn!(
                "Taking over expired lock held by {} since {}",
                existing.holder, existing.acquired_at
            );
        }

        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, operation);
        self.write_lock_file(&lock_info).await?;

        info!(
            "Acquired state lock: {} (expires in {}s)",
            lock_info.lock_id, LOCK_EXPIRY_SECS
        );

        Ok(lock_info)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                info!("Released state lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;
    use crate::schema::{InstanceState, Value};
    use tempfile::TempDir;

    fn test_store() -> (LocalStateStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStateStore::with_state_path(temp_dir.path().join("nested/state.json"));
        (store, temp_dir)
    }

    fn sample_state() -> ReconcileState {
        let mut state = ReconcileState::new();
        state.record(
            "web-ip",
            ResourceKind::CloudIp,
            InstanceState {
                id: String::from("cip-k4a25"),
                attributes: [(String::from("target"), Value::from("int-001"))].into(),
            },
        );
        state
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = test_store();

        store.save(&sample_state()).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        let resource = loaded.get("web-ip").unwrap();
        assert_eq!(resource.id, "cip-k4a25");
        assert_eq!(resource.kind, ResourceKind::CloudIp);
        assert_eq!(loaded.checksum.len(), 64);
        assert!(!store.state_path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = test_store();

        assert!(store.load().await.unwrap().is_none());
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_tampered_file_is_rejected() {
        let (store, _temp) = test_store();
        store.save(&sample_state()).await.unwrap();

        let content = std::fs::read_to_string(store.state_path()).unwrap();
        std::fs::write(store.state_path(), content.replace("cip-k4a25", "cip-zzzzz")).unwrap();

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, ReconcileError::State(StateError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_delete_removes_state() {
        let (store, _temp) = test_store();
        store.save(&sample_state()).await.unwrap();

        store.delete().await.unwrap();
        assert!(!store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let (store, _temp) = test_store();

        let lock = store.acquire_lock("", "apply").await.unwrap();
        let info = store.get_lock_info().await.unwrap().unwrap();
        assert_eq!(info.lock_id, lock.lock_id);
        assert_eq!(info.operation, "apply");

        store.release_lock(&lock.lock_id).await.unwrap();
        assert!(store.get_lock_info().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = test_store();

        let _held = store.acquire_lock("holder-1", "apply").await.unwrap();
        let err = store.acquire_lock("holder-2", "destroy").await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::State(StateError::LockedByOther { ref holder, .. }) if holder == "holder-1"
        ));
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let (store, _temp) = test_store();
        let mut stale = LockInfo::new("crashed", "apply");
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(5);
        store.write_lock_file(&stale).await.unwrap();

        let lock = store.acquire_lock("holder-2", "apply").await.unwrap();
        assert_eq!(lock.holder, "holder-2");
    }
}
