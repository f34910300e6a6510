// SPDX-FileCopyrightText: 2026 Dockyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry spacing and the overall retry budget.
//!
//! Registry lookups and transport calls share these functions so that both
//! honor the same 30-second budget.

use std::future::Future;
use std::time::Duration;

use dockyard_core::DockyardError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Total time a retrying operation may spend before giving up.
pub const RETRY_CEILING: Duration = Duration::from_secs(30);

/// Delay before retry number `attempt` (zero-based): 1s doubling, capped at
/// [`RETRY_CEILING`].
pub fn backoff(attempt: u32) -> Duration {
    let ceiling = RETRY_CEILING.as_secs();
    let secs = 1u64
        .checked_shl(attempt)
        .filter(|secs| *secs <= ceiling)
        .unwrap_or(ceiling);
    Duration::from_secs(secs)
}

/// True when sleeping `next_delay` more would reach the retry ceiling.
pub fn deadline_exceeded(start: Instant, next_delay: Duration) -> bool {
    start.elapsed() + next_delay >= RETRY_CEILING
}

/// Bookkeeping for one retrying operation.
#[derive(Debug, Clone)]
pub struct Retry {
    start: Instant,
    attempt: u32,
}

impl Retry {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            attempt: 0,
        }
    }

    /// Number of retries scheduled so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = backoff(self.attempt);
        if deadline_exceeded(self.start, delay) {
            return None;
        }
        self.attempt += 1;
        Some(delay)
    }

    /// Sleeps before the next attempt.
    ///
    /// Returns `Ok(false)` when the budget is spent and the caller should
    /// surface its last error.
    pub async fn wait(
        &mut self,
        what: &str,
        cancel: Option<&CancellationToken>,
    ) -> Result<bool, DockyardError> {
        let Some(delay) = self.next_delay() else {
            return Ok(false);
        };
        warn!(
            operation = what,
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying"
        );
        cancellable(cancel, tokio::time::sleep(delay)).await?;
        Ok(true)
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `fut` to completion unless `cancel` fires first.
pub async fn cancellable<F, T>(cancel: Option<&CancellationToken>, fut: F) -> Result<T, DockyardError>
where
    F: Future<Output = T>,
{
    match cancel {
        None => Ok(fut.await),
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(DockyardError::Cancelled),
            value = fut => Ok(value),
        },
    }
}
