use std::future::Future;
use std::time::Duration;

use log::warn;
use serde::Deserialize;

use crate::core::Result;

/// Repository behavior shared by every repository built on one context.
///
/// Loaded once (typically deserialized from the host's settings file) and
/// injected into the data context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepositoryOptions {
    /// Whether reads include soft-deleted rows when no override is active
    pub default_fetch_soft_deleted: bool,

    /// Whether a fetch-state override clears itself after one operation
    pub reset_fetch_state_after_every_operation: bool,

    /// Whether commands commit immediately or leave it to an explicit save
    pub save_changes_after_every_operation: bool,

    pub audit_modification_date: bool,
    pub audit_modifier: bool,
    pub audit_deletion_date: bool,
    pub audit_deleter: bool,

    /// Recursion bound of the cascade include resolver
    pub max_cascade_depth: usize,

    /// Execution strategy used by transaction scopes
    pub retry: RetryPolicy,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            default_fetch_soft_deleted: false,
            reset_fetch_state_after_every_operation: true,
            save_changes_after_every_operation: true,
            audit_modification_date: true,
            audit_modifier: true,
            audit_deletion_date: true,
            audit_deleter: true,
            max_cascade_depth: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl RepositoryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_fetch_soft_deleted(mut self, fetch: bool) -> Self {
        self.default_fetch_soft_deleted = fetch;
        self
    }

    pub fn reset_fetch_state_after_every_operation(mut self, reset: bool) -> Self {
        self.reset_fetch_state_after_every_operation = reset;
        self
    }

    pub fn save_changes_after_every_operation(mut self, save: bool) -> Self {
        self.save_changes_after_every_operation = save;
        self
    }

    /// Toggle all four audit stamps at once
    pub fn auditing(mut self, enabled: bool) -> Self {
        self.audit_modification_date = enabled;
        self.audit_modifier = enabled;
        self.audit_deletion_date = enabled;
        self.audit_deleter = enabled;
        self
    }

    pub fn audit_modification_date(mut self, enabled: bool) -> Self {
        self.audit_modification_date = enabled;
        self
    }

    pub fn audit_modifier(mut self, enabled: bool) -> Self {
        self.audit_modifier = enabled;
        self
    }

    pub fn audit_deletion_date(mut self, enabled: bool) -> Self {
        self.audit_deletion_date = enabled;
        self
    }

    pub fn audit_deleter(mut self, enabled: bool) -> Self {
        self.audit_deleter = enabled;
        self
    }

    pub fn max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Retry behavior for transient faults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Base duration in milliseconds for backoff calculation.
    pub base_backoff_ms: u64,
    /// Maximum duration in milliseconds for backoff.
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

impl RetryPolicy {
    /// A policy that runs the operation exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, attempt: usize, err: &crate::core::RepoError) -> bool {
        attempt < self.max_attempts.max(1) && err.is_transient()
    }

    pub fn backoff_ms(&self, attempt: usize) -> u64 {
        let base = self.base_backoff_ms.max(1);
        let cap = self.max_backoff_ms.max(base);

        let mut backoff = base;
        for _ in 1..attempt {
            backoff = backoff.saturating_mul(2).min(cap);
        }
        backoff
    }

    /// Runs `operation`, re-running it after transient failures.
    ///
    /// Non-transient errors and the error of the last attempt are returned
    /// unchanged.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !self.should_retry(attempt, &err) {
                        return Err(err);
                    }

                    let backoff_ms = self.backoff_ms(attempt);
                    warn!(
                        "execution strategy retry on transient fault (attempt {} of {}): {} (backoff={}ms)",
                        attempt,
                        self.max_attempts.max(1),
                        err,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
            }
        }
    }
}
