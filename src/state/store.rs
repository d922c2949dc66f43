//! State store trait definition.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::ReconcileState;
use crate::error::Result;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the state, or `None` if nothing was saved yet.
    async fn load(&self) -> Result<Option<ReconcileState>>;

    /// Saves the state.
    async fn save(&self, state: &ReconcileState) -> Result<()>;

    /// Deletes the state.
    async fn delete(&self) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires the lock for `operation`.
    ///
    /// An empty `holder` is replaced by an identifier for this process.
    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo>;

    /// Releases a lock previously acquired.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
