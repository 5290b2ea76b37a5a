//! Behavior-driven tests for batch orchestration
//!
//! These tests verify HOW a batch behaves when instruments fail, stall or are
//! unknown: every requested key yields one result, failures stay isolated,
//! and the scrape session is released exactly once on every exit path.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use marketpipe_core::scrape::DriverFuture;
use marketpipe_core::{
    AssetClass, ErrorKind, FetchError, FetchResult, HistoryQuery, HttpClient, HttpError,
    HttpRequest, HttpResponse, InstrumentCatalog, InstrumentRef, MarketDataConfig,
    MarketDataService, MarketPayload, RawSeriesPoint, RestQuoteClient, RetryConfig, ScrapeDriver,
};

const FLOW_BODY: &str =
    r#"{"buyVolume": 120000, "sellVolume": 95000, "buyValue": 3.2e9, "sellValue": 2.5e9}"#;

// =============================================================================
// Fakes
// =============================================================================

#[derive(Clone)]
enum Script {
    Points(Vec<RawSeriesPoint>),
    Fail(&'static str),
    Stall,
}

#[derive(Default)]
struct FakeDriver {
    launches: AtomicUsize,
    shutdowns: AtomicUsize,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fail_launch: bool,
    scripts: HashMap<&'static str, Script>,
}

impl FakeDriver {
    fn failing_launch() -> Self {
        Self {
            fail_launch: true,
            ..Self::default()
        }
    }

    fn with_script(mut self, key: &'static str, script: Script) -> Self {
        self.scripts.insert(key, script);
        self
    }

    fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

fn daily_series() -> Vec<RawSeriesPoint> {
    vec![
        RawSeriesPoint::complete(1_700_086_400_000, 24_050.0, 24_200.0, 24_000.0, 24_150.0, 900.0),
        RawSeriesPoint::complete(1_700_000_000_000, 24_000.0, 24_100.0, 23_950.0, 24_050.0, 1_200.0),
    ]
}

impl ScrapeDriver for FakeDriver {
    type Context = ();

    fn launch(&self) -> DriverFuture<'_, ()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail_launch;
        Box::pin(async move {
            if fail {
                Err(FetchError::source("browser failed to start"))
            } else {
                Ok(())
            }
        })
    }

    fn history<'a>(
        &'a self,
        _context: &'a (),
        instrument: &'a InstrumentRef,
        _query: HistoryQuery,
    ) -> DriverFuture<'a, Vec<RawSeriesPoint>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;

            let script = self
                .scripts
                .get(instrument.logical_key.as_str())
                .cloned()
                .unwrap_or_else(|| Script::Points(daily_series()));
            let result = match script {
                Script::Points(points) => Ok(points),
                Script::Fail(message) => Err(FetchError::source(message)),
                Script::Stall => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Vec::new())
                }
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }

    fn shutdown(&self, _context: &()) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone)]
enum Reply {
    Status(u16, &'static str),
    Delayed(Duration, u16, &'static str),
    Transport(HttpError),
}

/// Replies are consumed in order per route; the last one repeats.
#[derive(Default)]
struct ScriptedHttp {
    calls: AtomicUsize,
    routes: Mutex<Vec<(&'static str, VecDeque<Reply>)>>,
}

impl ScriptedHttp {
    fn route(self, suffix: &'static str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .expect("routes lock")
            .push((suffix, replies.into()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpClient for ScriptedHttp {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut routes = self.routes.lock().expect("routes lock");
            routes
                .iter_mut()
                .find(|(suffix, _)| request.url.ends_with(suffix))
                .and_then(|(_, replies)| {
                    if replies.len() > 1 {
                        replies.pop_front()
                    } else {
                        replies.front().cloned()
                    }
                })
        };

        Box::pin(async move {
            match reply {
                None => Ok(HttpResponse::new(404, "no route")),
                Some(Reply::Status(status, body)) => Ok(HttpResponse::new(status, body)),
                Some(Reply::Delayed(delay, status, body)) => {
                    tokio::time::sleep(delay).await;
                    Ok(HttpResponse::new(status, body))
                }
                Some(Reply::Transport(error)) => Err(error),
            }
        })
    }
}

fn default_http() -> ScriptedHttp {
    ScriptedHttp::default()
        .route("/foreign-trade", vec![Reply::Status(200, FLOW_BODY)])
        .route("/slow", vec![Reply::Delayed(Duration::from_secs(5), 200, FLOW_BODY)])
        .route("/offline", vec![Reply::Transport(HttpError::connect("connection refused"))])
}

fn catalog() -> Arc<InstrumentCatalog> {
    Arc::new(
        InstrumentCatalog::new(vec![
            InstrumentRef::scrape("currencies/usd-vnd", "1956", "USD/VND", AssetClass::Currency)
                .expect("valid"),
            InstrumentRef::scrape("indices/vn", "41064", "VN-Index", AssetClass::Index)
                .expect("valid"),
            InstrumentRef::rest(
                "flows/foreign-trade",
                "/api/v1/market/foreign-trade",
                "Foreign trade flow",
            )
            .expect("valid"),
            InstrumentRef::rest("flows/slow", "/api/v1/market/slow", "Slow flow").expect("valid"),
            InstrumentRef::rest("flows/offline", "/api/v1/market/offline", "Offline flow")
                .expect("valid"),
        ])
        .expect("valid catalog"),
    )
}

fn service(driver: &Arc<FakeDriver>, http: &Arc<ScriptedHttp>) -> MarketDataService<FakeDriver> {
    let config = MarketDataConfig::default()
        .with_scrape_timeout_ms(300)
        .with_rest_timeout_ms(100)
        .with_rest_concurrency(2);
    let rest = RestQuoteClient::new("http://rest.test", Arc::clone(http) as Arc<dyn HttpClient>);
    MarketDataService::new(catalog(), Arc::clone(driver), rest, config)
}

fn failure_kind(result: Option<&FetchResult>) -> Option<ErrorKind> {
    result.and_then(FetchResult::error_kind)
}

// =============================================================================
// Batch: Result Shape
// =============================================================================

#[tokio::test]
async fn every_requested_key_gets_exactly_one_result_in_request_order() {
    // Given: A mix of scrape, REST and unknown keys
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);
    let keys = [
        "flows/foreign-trade",
        "currencies/usd-vnd",
        "bogus/key",
        "indices/vn",
    ];

    // When: The batch runs
    let report = service.run_batch(&keys).await;

    // Then: One result per key, in request order
    assert_eq!(report.len(), keys.len());
    let order = report.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>();
    assert_eq!(order, keys);
    assert_eq!(report.success_count(), 3);
    assert_eq!(
        failure_kind(report.get("bogus/key")),
        Some(ErrorKind::UnknownInstrument)
    );
    assert!(report.session_opened);
    assert_eq!(report.rounds, 1);
}

#[tokio::test]
async fn repeated_keys_collapse_to_a_single_fetch() {
    // Given: The same key requested three times, once with whitespace
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The batch runs
    let report = service
        .run_batch(&["indices/vn", " indices/vn ", "indices/vn"])
        .await;

    // Then: One entry per distinct requested string, one upstream fetch
    let keys = report.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>();
    assert_eq!(keys, ["indices/vn", " indices/vn "]);
    assert_eq!(driver.fetches(), 1);
}

#[tokio::test]
async fn padded_keys_are_reported_under_the_requested_spelling() {
    // Given: Two spellings of the same instrument, neither trimmed
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The batch runs
    let report = service.run_batch(&[" indices/vn", "indices/vn "]).await;

    // Then: Each requested string finds its own result
    assert_eq!(report.len(), 2);
    for key in [" indices/vn", "indices/vn "] {
        let result = report.get(key).expect("requested key present");
        assert!(result.is_success(), "{key}: {result:?}");
        assert_eq!(result.instrument_key(), "indices/vn");
    }

    // And: The instrument was fetched once
    assert_eq!(driver.fetches(), 1);
}

#[tokio::test]
async fn empty_batch_touches_nothing() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service.run_batch::<&str>(&[]).await;

    assert!(report.is_empty());
    assert!(!report.session_opened);
    assert_eq!(driver.launches(), 0);
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn failure_results_serialize_with_kind_and_message() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service.run_batch(&["bogus/key"]).await;
    let value = serde_json::to_value(report.get("bogus/key")).expect("serializable");

    assert_eq!(value["status"], "failure");
    assert_eq!(value["instrument_key"], "bogus/key");
    assert_eq!(value["kind"]["kind"], "unknown_instrument");
    assert!(value["message"]
        .as_str()
        .expect("message string")
        .contains("bogus/key"));
}

// =============================================================================
// Batch: Failure Isolation
// =============================================================================

#[tokio::test]
async fn unknown_key_never_reaches_any_client() {
    // Given: Only an unknown key
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The batch runs
    let report = service.run_batch(&["currencies/not-a-pair"]).await;

    // Then: The key fails without opening a session or issuing a request
    assert_eq!(
        failure_kind(report.get("currencies/not-a-pair")),
        Some(ErrorKind::UnknownInstrument)
    );
    assert!(!report.session_opened);
    assert_eq!(driver.launches(), 0);
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn failing_scrape_fetch_still_closes_session_exactly_once() {
    // Given: A driver that errors on one of two scrape instruments
    let driver = Arc::new(
        FakeDriver::default().with_script("currencies/usd-vnd", Script::Fail("navigation crashed")),
    );
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The batch runs
    let report = service
        .run_batch(&["currencies/usd-vnd", "indices/vn"])
        .await;

    // Then: The failure is isolated and the shared session closed once
    assert_eq!(
        failure_kind(report.get("currencies/usd-vnd")),
        Some(ErrorKind::SourceError)
    );
    assert!(report
        .get("indices/vn")
        .is_some_and(FetchResult::is_success));
    assert_eq!(driver.launches(), 1);
    assert_eq!(driver.shutdowns(), 1);
}

#[tokio::test]
async fn stalled_scrape_fetch_times_out_and_batch_continues() {
    let driver = Arc::new(FakeDriver::default().with_script("indices/vn", Script::Stall));
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service
        .run_batch(&["indices/vn", "currencies/usd-vnd"])
        .await;

    assert_eq!(
        failure_kind(report.get("indices/vn")),
        Some(ErrorKind::FetchTimeout)
    );
    assert!(report
        .get("currencies/usd-vnd")
        .is_some_and(FetchResult::is_success));
    assert_eq!(driver.shutdowns(), 1);
}

#[tokio::test]
async fn empty_scrape_series_is_empty_response() {
    let driver = Arc::new(FakeDriver::default().with_script("indices/vn", Script::Points(Vec::new())));
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service.run_batch(&["indices/vn"]).await;

    assert_eq!(
        failure_kind(report.get("indices/vn")),
        Some(ErrorKind::EmptyResponse)
    );
}

#[tokio::test]
async fn rest_timeout_fails_only_that_instrument() {
    // Given: One REST endpoint that answers far beyond the 100ms budget
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);
    let started = Instant::now();

    // When: The batch runs alongside healthy instruments
    let report = service
        .run_batch(&["flows/slow", "flows/foreign-trade", "indices/vn"])
        .await;

    // Then: Only the slow endpoint fails, and the batch does not wait for it
    assert_eq!(failure_kind(report.get("flows/slow")), Some(ErrorKind::Timeout));
    assert!(report
        .get("flows/foreign-trade")
        .is_some_and(FetchResult::is_success));
    assert!(report
        .get("indices/vn")
        .is_some_and(FetchResult::is_success));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn connection_failure_is_network_error() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service.run_batch(&["flows/offline"]).await;

    assert_eq!(
        failure_kind(report.get("flows/offline")),
        Some(ErrorKind::NetworkError)
    );
}

#[tokio::test]
async fn session_open_failure_fails_scrape_instruments_but_not_rest() {
    // Given: A driver whose session can never be opened
    let driver = Arc::new(FakeDriver::failing_launch());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The batch mixes scrape and REST instruments
    let report = service
        .run_batch(&["currencies/usd-vnd", "flows/foreign-trade", "indices/vn"])
        .await;

    // Then: Scrape instruments share one SourceError, REST still succeeds
    for key in ["currencies/usd-vnd", "indices/vn"] {
        let Some(FetchResult::Failure { kind, message, .. }) = report.get(key) else {
            panic!("{key} should have failed");
        };
        assert_eq!(*kind, ErrorKind::SourceError);
        assert!(message.contains("unavailable"), "{message}");
    }
    assert!(report
        .get("flows/foreign-trade")
        .is_some_and(FetchResult::is_success));
    assert_eq!(driver.launches(), 1, "open is attempted once per batch");
    assert_eq!(driver.fetches(), 0);
    assert_eq!(driver.shutdowns(), 0, "nothing was opened, nothing to close");
    assert!(!report.session_opened);
}

#[tokio::test]
async fn partial_series_succeeds_with_warnings() {
    let points = vec![
        RawSeriesPoint::complete(2, 10.0, 12.0, 9.0, 11.0, 5.0),
        RawSeriesPoint::complete(1, 10.0, 8.0, 9.0, 11.0, 5.0),
        RawSeriesPoint {
            close: None,
            ..RawSeriesPoint::complete(3, 10.0, 12.0, 9.0, 11.0, 5.0)
        },
    ];
    let driver = Arc::new(FakeDriver::default().with_script("indices/vn", Script::Points(points)));
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service.run_batch(&["indices/vn"]).await;

    let Some(FetchResult::Success {
        payload: MarketPayload::Candles(candles),
        warnings,
        ..
    }) = report.get("indices/vn")
    else {
        panic!("expected candles");
    };
    assert_eq!(candles.len(), 1);
    assert_eq!(candles[0].timestamp, 2);
    assert_eq!(warnings.len(), 2);
}

// =============================================================================
// Batch: Session Lifecycle
// =============================================================================

#[tokio::test]
async fn scrape_fetches_never_overlap_within_a_batch() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let report = service
        .run_batch(&["currencies/usd-vnd", "indices/vn", "flows/foreign-trade"])
        .await;

    assert_eq!(report.success_count(), 3);
    assert_eq!(driver.fetches(), 2);
    assert_eq!(driver.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(driver.launches(), 1, "one session serves every scrape instrument");
}

#[tokio::test]
async fn concurrent_batches_use_separate_sessions() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    let (first, second) = tokio::join!(
        service.run_batch(&["indices/vn"]),
        service.run_batch(&["currencies/usd-vnd"])
    );

    assert_eq!(first.success_count(), 1);
    assert_eq!(second.success_count(), 1);
    assert_eq!(driver.launches(), 2);
    assert_eq!(driver.shutdowns(), 2);
}

#[tokio::test]
async fn dropping_an_in_flight_batch_releases_the_session() {
    // Given: A scrape fetch that will not finish before the caller gives up
    let driver = Arc::new(FakeDriver::default().with_script("indices/vn", Script::Stall));
    let http = Arc::new(default_http());
    let service = service(&driver, &http);

    // When: The caller abandons the batch mid-fetch
    let outcome =
        tokio::time::timeout(Duration::from_millis(50), service.run_batch(&["indices/vn"])).await;

    // Then: The batch future was dropped and the session closed anyway
    assert!(outcome.is_err(), "batch should have been cancelled");
    assert_eq!(driver.launches(), 1);
    assert_eq!(driver.shutdowns(), 1);
}

// =============================================================================
// Batch: Retry
// =============================================================================

#[tokio::test]
async fn retry_refetches_only_retryable_failures() {
    // Given: A REST endpoint that is busy once, then healthy
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(ScriptedHttp::default().route(
        "/foreign-trade",
        vec![Reply::Status(503, "busy"), Reply::Status(200, FLOW_BODY)],
    ));
    let service = service(&driver, &http);
    let retry = RetryConfig::fixed(Duration::from_millis(1), 2);

    // When: The batch runs with retry
    let report = service
        .run_batch_with_retry(&["currencies/usd-vnd", "flows/foreign-trade", "bogus/key"], &retry)
        .await;

    // Then: Only the busy endpoint was fetched again
    assert!(report
        .get("flows/foreign-trade")
        .is_some_and(FetchResult::is_success));
    assert_eq!(
        failure_kind(report.get("bogus/key")),
        Some(ErrorKind::UnknownInstrument)
    );
    assert_eq!(report.rounds, 2);
    assert_eq!(http.calls(), 2);
    assert_eq!(driver.launches(), 1);
    assert_eq!(driver.fetches(), 1);

    let order = report.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>();
    assert_eq!(order, ["currencies/usd-vnd", "flows/foreign-trade", "bogus/key"]);
}

#[tokio::test]
async fn non_retryable_http_status_is_kept() {
    let driver = Arc::new(FakeDriver::default());
    let http = Arc::new(ScriptedHttp::default().route("/foreign-trade", vec![Reply::Status(404, "gone")]));
    let service = service(&driver, &http);

    let report = service
        .run_batch_with_retry(&["flows/foreign-trade"], &RetryConfig::fixed(Duration::from_millis(1), 3))
        .await;

    assert_eq!(
        failure_kind(report.get("flows/foreign-trade")),
        Some(ErrorKind::HttpError(404))
    );
    assert_eq!(report.rounds, 1);
    assert_eq!(http.calls(), 1);
}
