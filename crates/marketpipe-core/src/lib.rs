//! # Marketpipe Core
//!
//! Market data acquisition and normalization for marketpipe.
//!
//! ## Overview
//!
//! Instruments come from two upstreams with very different behavior:
//!
//! - **Scrape source**: a stateful chart site that needs a warmed-up session,
//!   reused for every history fetch in a batch and always released
//! - **REST source**: a stateless JSON endpoint serving the foreign-investor
//!   trade flow aggregate
//!
//! [`MarketDataService::run_batch`] fetches a set of instruments from both,
//! normalizes each response into [`Candle`]s or a [`FlowDelta`], and returns
//! one [`FetchResult`] per requested key. A failing instrument never fails the
//! batch.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`catalog`] | Logical key to source identifier lookup |
//! | [`config`] | Base URLs, timeouts and concurrency, from env |
//! | [`domain`] | Domain models (Candle, FlowDelta, InstrumentRef) |
//! | [`error`] | Validation errors and per-instrument failure kinds |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`normalizer`] | Pure raw-payload to canonical-record conversion |
//! | [`presentation`] | Overview rows built from a batch report |
//! | [`rest_client`] | REST aggregate client |
//! | [`retry`] | Batch-level retry policy |
//! | [`scrape`] | Scrape session lifecycle and HTTP driver |
//! | [`service`] | Batch orchestration |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use marketpipe_core::{InstrumentCatalog, MarketDataConfig, MarketDataService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let catalog = Arc::new(InstrumentCatalog::builtin());
//!     let service = MarketDataService::from_config(catalog, MarketDataConfig::from_env()?);
//!
//!     let report = service
//!         .run_batch(&["currencies/usd-vnd", "flows/foreign-trade"])
//!         .await;
//!     for (key, result) in report.iter() {
//!         println!("{key}: {}", if result.is_success() { "ok" } else { "failed" });
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  MarketDataService  │
//! └──────────┬──────────┘
//!            │ resolve via InstrumentCatalog
//!     ┌──────┴───────────────────┐
//!     ▼ sequential               ▼ concurrent
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │ SessionScope        │   │ RestQuoteClient     │
//! │ ScrapeSessionClient │   │                     │
//! └──────────┬──────────┘   └──────────┬──────────┘
//!            ▼                         ▼
//! ┌─────────────────────┐   ┌─────────────────────┐
//! │ ScrapeDriver        │   │ HttpClient          │
//! └──────────┬──────────┘   └──────────┬──────────┘
//!            └────────────┬────────────┘
//!                         ▼
//!              ┌─────────────────────┐
//!              │ normalizer          │
//!              │ (Candle, FlowDelta) │
//!              └─────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Per-instrument failures are values, not errors:
//!
//! ```rust
//! use marketpipe_core::{ErrorKind, FetchError};
//!
//! let error = FetchError::http(503, "service unavailable");
//! assert_eq!(error.kind(), ErrorKind::HttpError(503));
//! assert!(error.retryable());
//! ```

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod normalizer;
pub mod presentation;
pub mod rest_client;
pub mod retry;
pub mod scrape;
pub mod service;

// Catalog
pub use catalog::{InstrumentCatalog, FOREIGN_FLOW_PATH};

// Configuration
pub use config::{MarketDataConfig, DEFAULT_REST_BASE_URL, DEFAULT_SCRAPE_BASE_URL};

// Domain models
pub use domain::{
    AssetClass, Candle, FlowDelta, HistoryQuery, InstrumentRef, Period, RawSeriesPoint,
    Resolution, Sign, SourceKind,
};

// Error types
pub use error::{CoreError, ErrorKind, FetchError, ValidationError};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Normalization
pub use normalizer::{
    normalize, normalize_aggregate_payload, normalize_scrape_series, MarketPayload, Normalized,
    NormalizedSeries, RawPayload,
};

// Presentation
pub use presentation::{overview, InstrumentView, ViewDetail};

// Clients
pub use rest_client::RestQuoteClient;
pub use scrape::{
    HttpScrapeDriver, ScrapeDriver, ScrapeSessionClient, Session, SessionScope,
};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Orchestration
pub use service::{BatchReport, FetchResult, MarketDataService};
