//! Caller-side retry for publication targets
//!
//! The coordinator never retries. A target wrapped in `RetryingTarget` is
//! re-run under a [`RetryPolicy`] when its failure is transient: a
//! [`TransferError`] the remote side may not repeat, or an interrupted local
//! I/O operation. Everything else fails on the first attempt.

use crate::core::config::RetryConfig;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Failure of a single transfer to a remote repository
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("PUT {url} failed (HTTP {status})")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("PUT {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl TransferError {
    /// Whether the same transfer may succeed when repeated
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status { status, .. } => matches!(
                status.as_u16(),
                408 | 425 | 429 | 500 | 502 | 503 | 504
            ),
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
        }
    }
}

/// Classify a target failure by walking its cause chain
pub fn is_transient(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(transfer) = cause.downcast_ref::<TransferError>() {
            return transfer.is_transient();
        }
        cause.downcast_ref::<io::Error>().is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            )
        })
    })
}

/// Attempt budget and backoff for one target
///
/// The delay before retry `n` is `initial_delay * 2^(n-1)`, capped at
/// `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included; at least 1
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: config.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            initial_delay: config
                .initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
            max_delay: defaults.max_delay,
        }
    }
}

impl RetryPolicy {
    /// Delay slept before the given retry (1 for the first retry)
    pub fn delay_before(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or the attempt
    /// budget is spent; the last error is returned unchanged
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt >= self.max_attempts || !is_transient(&error) {
                return Err(error);
            }

            let delay = self.delay_before(attempt);
            debug!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %format!("{:#}", error),
                "transient failure, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
