use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::DbError;

/// Point in time after which a store call gives up.
///
/// Cancellation happens by dropping the in-flight future, which drops any
/// open transaction and rolls it back. Nothing is left half-written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    #[must_use]
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left, or zero once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Drives `operation` to completion or until the deadline passes.
    ///
    /// An already-expired deadline fails before `operation` is polled, so no
    /// connection is acquired.
    ///
    /// A `COMMIT` cut off here may still have landed on the server, leaving
    /// the caller unable to tell whether the write happened. Writers that
    /// must be safe to retry commit after `run` returns, as
    /// [`Store::ingest`](crate::Store::ingest) does.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::DeadlineExceeded`] on expiry, otherwise whatever
    /// `operation` returns.
    pub async fn run<T, F>(self, operation: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, DbError>>,
    {
        if self.is_expired() {
            return Err(DbError::DeadlineExceeded);
        }
        tokio::time::timeout_at(self.at, operation)
            .await
            .unwrap_or(Err(DbError::DeadlineExceeded))
    }
}
