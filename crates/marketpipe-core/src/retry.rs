//! Batch-level retry policy with exponential backoff and jitter.
//!
//! Clients never retry on their own; [`crate::MarketDataService::run_batch_with_retry`]
//! uses this policy to re-run only the instruments whose failure is retryable.

use std::time::Duration;

use crate::ErrorKind;

/// Backoff strategy between retry rounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between rounds.
    Fixed {
        /// Delay between rounds.
        delay: Duration,
    },
    /// Uses an exponential delay between rounds.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent round.
        factor: f64,
        /// The maximum duration to wait between rounds.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry round `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);

                if !jitter {
                    return delay;
                }

                let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                let total_ms = delay.as_millis() as i64 + random_offset as i64 - jitter_ms as i64;
                Duration::from_millis(total_ms.max(0) as u64)
            }
        }
    }
}

/// Which failures are worth another batch, and how long to wait.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total batches run = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// HTTP statuses from the REST source that trigger a retry.
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_network: bool,
    /// Scrape source rejections, including a session that failed to open.
    pub retry_on_source: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_network: true,
            retry_on_source: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry(&self, kind: ErrorKind) -> bool {
        if !self.enabled {
            return false;
        }
        match kind {
            ErrorKind::FetchTimeout | ErrorKind::Timeout => self.retry_on_timeout,
            ErrorKind::NetworkError => self.retry_on_network,
            ErrorKind::SourceError => self.retry_on_source,
            ErrorKind::HttpError(status) => self.retry_on_status.contains(&status),
            ErrorKind::UnknownInstrument | ErrorKind::EmptyResponse | ErrorKind::SchemaMismatch => {
                false
            }
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}
