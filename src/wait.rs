//! Polling until a remote resource reaches a target status.
//!
//! A [`StateChangeConf`] knows exactly two labels: the `pending` status that
//! keeps the loop going and the `target` status that ends it. Anything else is
//! an [`WaitError::UnexpectedState`], a failed refresh ends the wait at once,
//! and running out of time yields [`WaitError::Timeout`].

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::context::OpContext;
use crate::error::{ApiError, ApiResult, WaitError};

/// Default minimum time between polls.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Default ceiling for the poll backoff.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Parameters for one wait.
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// Status that means "keep waiting".
    pub pending: String,
    /// Status that ends the wait successfully.
    pub target: String,
    /// Overall time allowed.
    pub timeout: Duration,
    /// First sleep between polls.
    pub min_interval: Duration,
    /// Cap for the doubling backoff.
    pub max_interval: Duration,
}

impl StateChangeConf {
    /// Creates a wait from `pending` to `target` with default intervals.
    #[must_use]
    pub fn new(pending: impl Into<String>, target: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pending: pending.into(),
            target: target.into(),
            timeout,
            min_interval: DEFAULT_MIN_INTERVAL,
            max_interval: DEFAULT_MAX_INTERVAL,
        }
    }

    /// Sets the minimum poll interval.
    #[must_use]
    pub const fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sleep that follows `current`: doubled, capped at the larger of the
    /// configured ceiling and the minimum interval.
    fn next_interval(&self, current: Duration) -> Duration {
        let cap = self.max_interval.max(self.min_interval);
        current.saturating_mul(2).min(cap)
    }

    /// Polls `refresh` until it reports the target status.
    ///
    /// `refresh` returns the latest snapshot together with its status label.
    /// The snapshot from the poll that reached the target is returned.
    ///
    /// # Errors
    ///
    /// - [`WaitError::Refresh`] as soon as a refresh call fails
    /// - [`WaitError::UnexpectedState`] for a status that is neither pending
    ///   nor target
    /// - [`WaitError::Timeout`] once the timeout (or the context deadline)
    ///   passes
    /// - [`WaitError::Cancelled`] when the context is cancelled
    pub async fn wait_for_state<T, F, Fut>(
        &self,
        ctx: &OpContext,
        resource_id: &str,
        mut refresh: F,
    ) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<(T, String)>>,
    {
        let mut deadline = Instant::now() + self.timeout;
        if let Some(ctx_deadline) = ctx.deadline() {
            deadline = deadline.min(ctx_deadline);
        }

        let mut interval = self.min_interval;
        let mut last_status: Option<String> = None;
        let mut polls: u32 = 0;

        debug!(
            "Waiting for {resource_id} to become {} (pending {}, timeout {}s)",
            self.target,
            self.pending,
            self.timeout.as_secs()
        );

        loop {
            if ctx.is_cancelled() {
                return Err(self.cancelled(resource_id));
            }
            if Instant::now() >= deadline {
                return Err(self.timed_out(resource_id, last_status));
            }

            polls += 1;
            let Ok(refreshed) = tokio::time::timeout_at(deadline, ctx.call(refresh())).await else {
                return Err(self.timed_out(resource_id, last_status));
            };
            let (snapshot, status) = match refreshed {
                Ok(result) => result,
                Err(ApiError::Interrupted { .. }) if ctx.is_cancelled() => {
                    return Err(self.cancelled(resource_id));
                }
                Err(ApiError::Interrupted { .. }) => {
                    return Err(self.timed_out(resource_id, last_status));
                }
                Err(source) => {
                    return Err(WaitError::Refresh {
                        resource_id: resource_id.to_string(),
                        source,
                    });
                }
            };

            trace!("Poll {polls} of {resource_id}: {status}");

            if status == self.target {
                debug!("{resource_id} reached {status} after {polls} polls");
                return Ok(snapshot);
            }
            if status != self.pending {
                return Err(WaitError::UnexpectedState {
                    resource_id: resource_id.to_string(),
                    status,
                    pending: self.pending.clone(),
                    target: self.target.clone(),
                });
            }
            last_status = Some(status);

            let remaining = deadline.saturating_duration_since(Instant::now());
            let sleep = interval.min(remaining);
            tokio::select! {
                biased;
                () = ctx.cancelled() => return Err(self.cancelled(resource_id)),
                () = tokio::time::sleep(sleep) => {}
            }
            interval = self.next_interval(interval);
        }
    }

    fn timed_out(&self, resource_id: &str, last_status: Option<String>) -> WaitError {
        WaitError::Timeout {
            resource_id: resource_id.to_string(),
            target: self.target.clone(),
            last_status,
            timeout_secs: self.timeout.as_secs(),
        }
    }

    fn cancelled(&self, resource_id: &str) -> WaitError {
        debug!("Wait for {resource_id} to become {} cancelled", self.target);
        WaitError::Cancelled {
            resource_id: resource_id.to_string(),
        }
    }
}
