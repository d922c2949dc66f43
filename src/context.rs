//! Cancellation and deadline context for lifecycle calls.
//!
//! An [`OpContext`] is handed to every lifecycle entry point. Remote calls
//! made through [`OpContext::call`] and poll sleeps both stop as soon as the
//! context is cancelled or its deadline passes.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{ApiError, ApiResult};

/// Cancellation signal plus optional deadline.
#[derive(Debug, Clone)]
pub struct OpContext {
    /// Flips to `true` once cancelled.
    cancel: watch::Receiver<bool>,
    /// Absolute deadline for the whole call.
    deadline: Option<Instant>,
}

/// Owner side of a cancellable context.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl OpContext {
    /// Creates a context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        // Sender dropped: `changed()` errors and `cancelled()` pends forever.
        let (_tx, rx) = watch::channel(false);
        Self {
            cancel: rx,
            deadline: None,
        }
    }

    /// Creates a cancellable context and its handle.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                deadline: None,
            },
            CancelHandle { tx },
        )
    }

    /// Derives a child context whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Returns true if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Completes once the context is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Completes once the deadline passes, or never without one.
    pub async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Runs a remote call, abandoning it on cancellation or deadline.
    ///
    /// # Errors
    ///
    /// Returns the call's own error, or [`ApiError::Interrupted`].
    pub async fn call<T, F>(&self, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        tokio::select! {
            biased;
            () = self.cancelled() => Err(ApiError::Interrupted {
                reason: String::from("context cancelled"),
            }),
            () = self.expired() => Err(ApiError::Interrupted {
                reason: String::from("deadline exceeded"),
            }),
            result = fut => result,
        }
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}

impl CancelHandle {
    /// Cancels every context derived from this handle.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}
