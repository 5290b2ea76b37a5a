//! Runtime configuration for the acquisition pipeline.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MARKETPIPE_SCRAPE_BASE_URL` | `https://www.investing.com` | Chart-data site |
//! | `MARKETPIPE_REST_BASE_URL` | `https://api.marketpipe.local` | Aggregation endpoint host |
//! | `MARKETPIPE_SCRAPE_TIMEOUT_MS` | `15000` | Bound per session open and per history fetch |
//! | `MARKETPIPE_REST_TIMEOUT_MS` | `5000` | Bound per REST call |
//! | `MARKETPIPE_REST_CONCURRENCY` | `4` | Max REST calls in flight per batch |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::{HistoryQuery, ValidationError};

pub const DEFAULT_SCRAPE_BASE_URL: &str = "https://www.investing.com";
pub const DEFAULT_REST_BASE_URL: &str = "https://api.marketpipe.local";

#[derive(Debug, Clone, PartialEq)]
pub struct MarketDataConfig {
    pub scrape_base_url: String,
    pub rest_base_url: String,
    pub scrape_timeout_ms: u64,
    pub rest_timeout_ms: u64,
    pub rest_concurrency: usize,
    pub history: HistoryQuery,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            scrape_base_url: String::from(DEFAULT_SCRAPE_BASE_URL),
            rest_base_url: String::from(DEFAULT_REST_BASE_URL),
            scrape_timeout_ms: 15_000,
            rest_timeout_ms: 5_000,
            rest_concurrency: 4,
            history: HistoryQuery::default(),
        }
    }
}

impl MarketDataConfig {
    /// Defaults overridden by any `MARKETPIPE_*` variables that are set.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();

        if let Ok(url) = env::var("MARKETPIPE_SCRAPE_BASE_URL") {
            config.scrape_base_url = url;
        }
        if let Ok(url) = env::var("MARKETPIPE_REST_BASE_URL") {
            config.rest_base_url = url;
        }
        if let Some(ms) = parse_env("MARKETPIPE_SCRAPE_TIMEOUT_MS")? {
            config.scrape_timeout_ms = ms;
        }
        if let Some(ms) = parse_env("MARKETPIPE_REST_TIMEOUT_MS")? {
            config.rest_timeout_ms = ms;
        }
        if let Some(limit) = parse_env("MARKETPIPE_REST_CONCURRENCY")? {
            config.rest_concurrency = limit;
        }

        Ok(config)
    }

    pub fn with_scrape_base_url(mut self, url: impl Into<String>) -> Self {
        self.scrape_base_url = url.into();
        self
    }

    pub fn with_rest_base_url(mut self, url: impl Into<String>) -> Self {
        self.rest_base_url = url.into();
        self
    }

    pub fn with_scrape_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.scrape_timeout_ms = timeout_ms;
        self
    }

    pub fn with_rest_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.rest_timeout_ms = timeout_ms;
        self
    }

    pub fn with_rest_concurrency(mut self, limit: usize) -> Self {
        self.rest_concurrency = limit;
        self
    }

    pub fn with_history(mut self, history: HistoryQuery) -> Self {
        self.history = history;
        self
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_millis(self.scrape_timeout_ms)
    }
}

fn parse_env<T: FromStr>(name: &'static str) -> Result<Option<T>, ValidationError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::InvalidEnv { name, value }),
        Err(_) => Ok(None),
    }
}
