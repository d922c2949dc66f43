//! State management module.
//!
//! This module persists what the reconciler knows about remote resources:
//! identifiers, last known attributes and a short operation history.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalStateStore;
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use store::StateStore;
pub use types::{HistoryEntry, ReconcileState, ResourceState, STATE_VERSION, StateOperation};
