//! Retry policies for transient database failures.
//!
//! Only reads and bulk deletes are retried: re-running them inside the same
//! transaction is safe once the failed attempt has been rolled back to its
//! savepoint. Inserts and updates surface the first failure.
//!
//! ```ignore
//! use pgdoc::retry::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new()
//!     .max_attempts(5)
//!     .base_delay(Duration::from_millis(20));
//! let store = DocumentStore::connect(&url, StoreConfig::new().retry_policy(policy))?;
//! ```

use crate::error::{DocError, DocResult};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// What a command does, as far as retrying it is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    /// Transaction control and other statements that are never retried.
    #[default]
    None,
}

impl OperationKind {
    /// Whether a failed attempt may be repeated.
    pub fn is_retryable(self) -> bool {
        matches!(self, OperationKind::Select | OperationKind::Delete)
    }
}

/// Decides whether (and after how long) a failed attempt is repeated.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Delay before attempt `attempt + 1`, or `None` to give up.
    ///
    /// `attempt` counts from 1 for the attempt that just failed.
    fn should_retry(&self, error: &DocError, attempt: u32) -> Option<Duration>;

    fn is_enabled(&self) -> bool {
        true
    }
}

/// Bounded exponential backoff on transient errors.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total attempts including the first one.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

impl RetryPolicy for BackoffPolicy {
    fn should_retry(&self, error: &DocError, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts || !error.is_transient() {
            return None;
        }
        Some(self.delay(attempt))
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _error: &DocError, _attempt: u32) -> Option<Duration> {
        None
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Runs operations under a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryManager {
    policy: Arc<dyn RetryPolicy>,
}

impl Default for RetryManager {
    fn default() -> Self {
        Self::new(Arc::new(BackoffPolicy::default()))
    }
}

impl RetryManager {
    pub fn new(policy: Arc<dyn RetryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &dyn RetryPolicy {
        self.policy.as_ref()
    }

    /// Whether commands of `kind` go through the retry loop at all.
    pub fn retries(&self, kind: OperationKind) -> bool {
        kind.is_retryable() && self.policy.is_enabled()
    }

    /// Run `op` once, or under the retry loop when `kind` is retryable.
    pub async fn execute<T, F, Fut>(&self, kind: OperationKind, op: F) -> DocResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocResult<T>>,
    {
        if self.retries(kind) {
            self.retry(op).await
        } else {
            let mut op = op;
            op().await
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    pub async fn retry<T, F, Fut>(&self, mut op: F) -> DocResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DocResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.policy.should_retry(&error, attempt) {
                    Some(delay) => {
                        crate::logging::retry(attempt, delay, &error);
                        tokio::time::sleep(delay).await;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}
