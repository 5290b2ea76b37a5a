use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use super::{DriverFuture, ScrapeDriver};
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, ReqwestHttpClient};
use crate::{FetchError, HistoryQuery, InstrumentRef, RawSeriesPoint};

/// Builds the transport for a new session; each session gets its own jar.
pub type ClientFactory = Arc<dyn Fn() -> Result<Arc<dyn HttpClient>, HttpError> + Send + Sync>;

/// Cookie-jar HTTP session against the chart-data site.
///
/// `launch` visits the landing page so the site sets its session cookies,
/// then `history` reads the chart JSON endpoint with those cookies.
pub struct HttpScrapeDriver {
    base_url: String,
    request_timeout_ms: u64,
    client_factory: ClientFactory,
}

/// Per-session state: the cookie-carrying client, taken on shutdown.
pub struct HttpScrapeContext {
    client: Mutex<Option<Arc<dyn HttpClient>>>,
}

impl HttpScrapeContext {
    fn client(&self) -> Option<Arc<dyn HttpClient>> {
        self.client
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl HttpScrapeDriver {
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> Self {
        let factory: ClientFactory = Arc::new(|| {
            ReqwestHttpClient::with_cookie_store().map(|client| Arc::new(client) as Arc<dyn HttpClient>)
        });
        Self::with_client_factory(base_url, request_timeout_ms, factory)
    }

    pub fn with_client_factory(
        base_url: impl Into<String>,
        request_timeout_ms: u64,
        client_factory: ClientFactory,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            request_timeout_ms,
            client_factory,
        }
    }

    fn chart_url(&self, instrument: &InstrumentRef, query: HistoryQuery) -> String {
        format!(
            "{}/api/financialdata/{}/historical/chart/?period={}&interval={}&pointscount={}",
            self.base_url,
            urlencoding::encode(instrument.external_id.trim()),
            query.period,
            query.resolution,
            query.points
        )
    }
}

impl ScrapeDriver for HttpScrapeDriver {
    type Context = HttpScrapeContext;

    fn launch(&self) -> DriverFuture<'_, HttpScrapeContext> {
        Box::pin(async move {
            let client = (self.client_factory)().map_err(|error| {
                FetchError::source(format!("failed to create scrape client: {}", error.message()))
            })?;

            let warm_up = HttpRequest::get(format!("{}/", self.base_url))
                .with_header("accept", "text/html")
                .with_timeout_ms(self.request_timeout_ms);
            let response = client.execute(warm_up).await.map_err(|error| {
                FetchError::source(format!("scrape warm-up failed: {}", error.message()))
            })?;
            if !response.is_success() {
                return Err(FetchError::source(format!(
                    "scrape warm-up returned status {}",
                    response.status
                )));
            }

            debug!(base_url = %self.base_url, "scrape session warmed up");
            Ok(HttpScrapeContext {
                client: Mutex::new(Some(client)),
            })
        })
    }

    fn history<'a>(
        &'a self,
        context: &'a HttpScrapeContext,
        instrument: &'a InstrumentRef,
        query: HistoryQuery,
    ) -> DriverFuture<'a, Vec<RawSeriesPoint>> {
        Box::pin(async move {
            let client = context
                .client()
                .ok_or_else(|| FetchError::source("scrape session has been released"))?;

            let request = HttpRequest::get(self.chart_url(instrument, query))
                .with_header("accept", "application/json")
                .with_header("x-requested-with", "XMLHttpRequest")
                .with_header(
                    "referer",
                    format!(
                        "{}/{}-historical-data",
                        self.base_url,
                        instrument.source_key.trim_matches('/')
                    ),
                )
                .with_timeout_ms(self.request_timeout_ms);

            let response = client.execute(request).await.map_err(|error| match error.kind() {
                HttpErrorKind::Timeout => FetchError::fetch_timeout(format!(
                    "chart request for '{}' timed out",
                    instrument.logical_key
                )),
                HttpErrorKind::Connect | HttpErrorKind::Other => FetchError::source(format!(
                    "chart navigation for '{}' failed: {}",
                    instrument.logical_key,
                    error.message()
                )),
            })?;

            match response.status {
                200..=299 => parse_chart_body(&response.body),
                429 => Err(FetchError::source(format!(
                    "scrape source rate limited '{}'",
                    instrument.logical_key
                ))),
                status => Err(FetchError::source(format!(
                    "scrape source returned status {status} for '{}'",
                    instrument.logical_key
                ))),
            }
        })
    }

    fn shutdown(&self, context: &HttpScrapeContext) {
        let released = match context.client.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(released);
    }
}

/// Parses `{"data": [[ts_ms, open, high, low, close, volume, ...], ...]}`.
///
/// Rows keep whatever is present; validation is the normalizer's job.
pub fn parse_chart_body(body: &str) -> Result<Vec<RawSeriesPoint>, FetchError> {
    let payload: Value = serde_json::from_str(body)
        .map_err(|error| FetchError::source(format!("malformed chart page: {error}")))?;

    let rows = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::source("chart page has no 'data' array"))?;

    Ok(rows.iter().map(parse_row).collect())
}

fn parse_row(row: &Value) -> RawSeriesPoint {
    let Some(cells) = row.as_array() else {
        return RawSeriesPoint::default();
    };
    let number = |index: usize| cells.get(index).and_then(Value::as_f64);

    RawSeriesPoint {
        timestamp: cells
            .first()
            .and_then(|cell| cell.as_i64().or_else(|| cell.as_f64().map(|ts| ts as i64))),
        open: number(1),
        high: number(2),
        low: number(3),
        close: number(4),
        value: number(5),
    }
}
