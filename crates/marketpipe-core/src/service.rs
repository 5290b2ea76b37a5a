//! Batch orchestration.
//!
//! A batch resolves every requested key, drives the scrape session
//! sequentially and the REST client concurrently, normalizes each response on
//! its own, and returns one [`FetchResult`] per requested key. Nothing fails
//! the whole batch; the scrape session is released on every exit path.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::normalizer::{normalize, MarketPayload, Normalized, RawPayload};
use crate::retry::RetryConfig;
use crate::scrape::{HttpScrapeDriver, ScrapeDriver, ScrapeSessionClient, SessionScope};
use crate::{
    ErrorKind, FetchError, InstrumentCatalog, InstrumentRef, MarketDataConfig, RestQuoteClient,
    SourceKind,
};

/// Outcome for one instrument in one batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchResult {
    Success {
        instrument_key: String,
        payload: MarketPayload,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Failure {
        instrument_key: String,
        kind: ErrorKind,
        message: String,
    },
}

impl FetchResult {
    pub fn from_outcome(instrument_key: &str, outcome: Result<Normalized, FetchError>) -> Self {
        match outcome {
            Ok(normalized) => Self::Success {
                instrument_key: instrument_key.to_owned(),
                payload: normalized.payload,
                warnings: normalized.warnings,
            },
            Err(error) => Self::failure(instrument_key, &error),
        }
    }

    pub fn failure(instrument_key: &str, error: &FetchError) -> Self {
        Self::Failure {
            instrument_key: instrument_key.to_owned(),
            kind: error.kind(),
            message: error.message().to_owned(),
        }
    }

    pub fn instrument_key(&self) -> &str {
        match self {
            Self::Success { instrument_key, .. } | Self::Failure { instrument_key, .. } => {
                instrument_key
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Ordered mapping of requested key to outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: IndexMap<String, FetchResult>,
    pub latency_ms: u64,
    /// Whether any round opened a scrape session.
    pub session_opened: bool,
    /// Batches run, including retry rounds.
    pub rounds: u32,
}

impl BatchReport {
    pub fn get(&self, key: &str) -> Option<&FetchResult> {
        self.results.get(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.values().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FetchResult)> {
        self.results.iter()
    }
}

/// Entry point for acquisition batches.
pub struct MarketDataService<D: ScrapeDriver> {
    catalog: Arc<InstrumentCatalog>,
    driver: Arc<D>,
    rest: RestQuoteClient,
    config: MarketDataConfig,
}

impl MarketDataService<HttpScrapeDriver> {
    /// Production wiring: HTTP scrape driver and reqwest-backed REST client.
    pub fn from_config(catalog: Arc<InstrumentCatalog>, config: MarketDataConfig) -> Self {
        let driver = Arc::new(HttpScrapeDriver::new(
            config.scrape_base_url.clone(),
            config.scrape_timeout_ms,
        ));
        let rest = RestQuoteClient::with_reqwest(config.rest_base_url.clone());
        Self::new(catalog, driver, rest, config)
    }
}

impl<D: ScrapeDriver> MarketDataService<D> {
    pub fn new(
        catalog: Arc<InstrumentCatalog>,
        driver: Arc<D>,
        rest: RestQuoteClient,
        config: MarketDataConfig,
    ) -> Self {
        Self {
            catalog,
            driver,
            rest,
            config,
        }
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    /// Runs one batch over `keys`.
    ///
    /// Results are keyed by the requested string as given, in request order.
    /// A repeated string yields one entry. Distinct strings that resolve to
    /// the same instrument each get an entry but share a single fetch.
    pub async fn run_batch<K: AsRef<str>>(&self, keys: &[K]) -> BatchReport {
        let started = Instant::now();

        let mut slots: IndexMap<String, Result<String, FetchResult>> =
            IndexMap::with_capacity(keys.len());
        let mut resolved = HashSet::with_capacity(keys.len());
        let mut scrape = Vec::new();
        let mut rest = Vec::new();

        for key in keys {
            let requested = key.as_ref();
            if slots.contains_key(requested) {
                continue;
            }

            let slot = match self.catalog.resolve(requested) {
                Ok(instrument) => {
                    if resolved.insert(instrument.logical_key.as_str()) {
                        match instrument.source {
                            SourceKind::Scrape => scrape.push(instrument),
                            SourceKind::Rest => rest.push(instrument),
                        }
                    }
                    Ok(instrument.logical_key.clone())
                }
                Err(error) => {
                    warn!(instrument = %requested, "unknown instrument requested");
                    Err(FetchResult::failure(requested, &error))
                }
            };
            slots.insert(requested.to_owned(), slot);
        }

        // Fresh client per batch: concurrent batches never share a session.
        let client = ScrapeSessionClient::new(
            Arc::clone(&self.driver),
            self.config.scrape_timeout(),
            self.config.scrape_timeout(),
        );

        let ((scrape_results, session_opened), rest_results) =
            tokio::join!(self.run_scrape(&client, &scrape), self.run_rest(&rest));
        let outcomes = scrape_results
            .into_iter()
            .chain(rest_results)
            .collect::<HashMap<_, _>>();

        let results = slots
            .into_iter()
            .map(|(key, slot)| {
                let result = match slot {
                    Ok(logical_key) => outcomes.get(&logical_key).cloned().unwrap_or_else(|| {
                        FetchResult::failure(
                            &logical_key,
                            &FetchError::source("instrument produced no outcome"),
                        )
                    }),
                    Err(failure) => failure,
                };
                (key, result)
            })
            .collect::<IndexMap<_, _>>();

        let report = BatchReport {
            results,
            latency_ms: elapsed_ms(started),
            session_opened,
            rounds: 1,
        };
        info!(
            requested = report.len(),
            succeeded = report.success_count(),
            failed = report.failure_count(),
            session_opened,
            latency_ms = report.latency_ms,
            "batch complete"
        );
        report
    }

    /// Runs a batch, then re-runs only retryable failures in fresh batches.
    ///
    /// Each retry round opens its own session. Later outcomes replace earlier
    /// ones; key order is that of the first round.
    pub async fn run_batch_with_retry<K: AsRef<str>>(
        &self,
        keys: &[K],
        retry: &RetryConfig,
    ) -> BatchReport {
        let started = Instant::now();
        let mut report = self.run_batch(keys).await;
        if !retry.enabled {
            return report;
        }

        for attempt in 0..retry.max_retries {
            let pending = report
                .iter()
                .filter(|(_, result)| {
                    result
                        .error_kind()
                        .is_some_and(|kind| retry.should_retry(kind))
                })
                .map(|(key, _)| key.clone())
                .collect::<Vec<_>>();
            if pending.is_empty() {
                break;
            }

            let delay = retry.delay_for_attempt(attempt);
            info!(
                attempt = attempt + 1,
                pending = pending.len(),
                delay_ms = delay.as_millis() as u64,
                "retrying failed instruments"
            );
            tokio::time::sleep(delay).await;

            let retried = self.run_batch(&pending).await;
            report.session_opened |= retried.session_opened;
            report.rounds += 1;
            for (key, result) in retried.results {
                if let Some(slot) = report.results.get_mut(&key) {
                    *slot = result;
                }
            }
        }

        report.latency_ms = elapsed_ms(started);
        report
    }

    async fn run_scrape(
        &self,
        client: &ScrapeSessionClient<D>,
        instruments: &[&InstrumentRef],
    ) -> (Vec<(String, FetchResult)>, bool) {
        let mut scope = SessionScope::new(client);
        let mut results = Vec::with_capacity(instruments.len());

        for instrument in instruments {
            let outcome = match scope.fetch_history(instrument, self.config.history).await {
                Ok(points) => normalize(
                    &instrument.logical_key,
                    &instrument.display_name,
                    RawPayload::Series(points),
                ),
                Err(error) => Err(error),
            };
            results.push(record(instrument, outcome));
        }

        let opened = scope.was_opened();
        scope.close();
        (results, opened)
    }

    async fn run_rest(&self, instruments: &[&InstrumentRef]) -> Vec<(String, FetchResult)> {
        let timeout_ms = self.config.rest_timeout_ms;

        futures::stream::iter(instruments.iter().map(|instrument| async move {
            let outcome = match self
                .rest
                .fetch_aggregate(&instrument.source_key, timeout_ms)
                .await
            {
                Ok(raw) => normalize(
                    &instrument.logical_key,
                    &instrument.display_name,
                    RawPayload::Aggregate(raw),
                ),
                Err(error) => Err(error),
            };
            record(instrument, outcome)
        }))
        .buffered(self.config.rest_concurrency.max(1))
        .collect()
        .await
    }
}

fn record(
    instrument: &InstrumentRef,
    outcome: Result<Normalized, FetchError>,
) -> (String, FetchResult) {
    match &outcome {
        Ok(normalized) => {
            for warning in &normalized.warnings {
                warn!(instrument = %instrument.logical_key, "partial data: {warning}");
            }
            debug!(instrument = %instrument.logical_key, source = %instrument.source, "instrument normalized");
        }
        Err(error) => {
            warn!(
                instrument = %instrument.logical_key,
                code = error.code(),
                "instrument failed: {}",
                error.message()
            );
        }
    }

    let key = instrument.logical_key.clone();
    let result = FetchResult::from_outcome(&key, outcome);
    (key, result)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
