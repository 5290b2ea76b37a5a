//! Scrape session lifecycle.
//!
//! The scraping source is stateful and expensive to initialize, so one
//! [`Session`] is opened lazily per batch and reused for every scrape
//! instrument in it. [`ScrapeSessionClient`] owns that session;
//! [`SessionScope`] ties it to a lexical scope so it is released exactly once
//! on every exit path, including when the batch future is dropped.
//!
//! ```text
//! SessionScope::fetch_history ──▶ ScrapeSessionClient::open (first call only)
//!                              ──▶ ScrapeSessionClient::fetch_history (serialized)
//! SessionScope::close / Drop  ──▶ ScrapeSessionClient::close ──▶ ScrapeDriver::shutdown
//! ```

mod http_driver;

pub use http_driver::{parse_chart_body, ClientFactory, HttpScrapeContext, HttpScrapeDriver};

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{ErrorKind, FetchError, HistoryQuery, InstrumentRef, RawSeriesPoint};

pub type DriverFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send + 'a>>;

/// Automation backend behind a scrape session.
///
/// `launch` builds the expensive context (browser context, warmed cookie
/// jar), `history` navigates it once, `shutdown` frees it. `shutdown` is
/// synchronous so it can run from `Drop`.
pub trait ScrapeDriver: Send + Sync {
    type Context: Send + Sync;

    fn launch(&self) -> DriverFuture<'_, Self::Context>;

    fn history<'a>(
        &'a self,
        context: &'a Self::Context,
        instrument: &'a InstrumentRef,
        query: HistoryQuery,
    ) -> DriverFuture<'a, Vec<RawSeriesPoint>>;

    fn shutdown(&self, context: &Self::Context);
}

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to an open automation context.
pub struct Session<C> {
    id: u64,
    context: C,
    gate: Mutex<()>,
    closed: AtomicBool,
}

impl<C> Session<C> {
    fn new(context: C) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            context,
            gate: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<C> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owner of at most one open session at a time.
pub struct ScrapeSessionClient<D: ScrapeDriver> {
    driver: Arc<D>,
    open_timeout: Duration,
    fetch_timeout: Duration,
    slot: Mutex<Option<Arc<Session<D::Context>>>>,
}

impl<D: ScrapeDriver> ScrapeSessionClient<D> {
    pub fn new(driver: Arc<D>, open_timeout: Duration, fetch_timeout: Duration) -> Self {
        Self {
            driver,
            open_timeout,
            fetch_timeout,
            slot: Mutex::new(None),
        }
    }

    /// Returns the open session, launching one if none is open.
    pub async fn open(&self) -> Result<Arc<Session<D::Context>>, FetchError> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref().filter(|session| !session.is_closed()) {
            return Ok(Arc::clone(session));
        }

        let context = tokio::time::timeout(self.open_timeout, self.driver.launch())
            .await
            .map_err(|_| {
                FetchError::fetch_timeout(format!(
                    "scrape session did not open within {}ms",
                    self.open_timeout.as_millis()
                ))
            })??;

        let session = Arc::new(Session::new(context));
        info!(session_id = session.id, "scrape session opened");
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Retrieves one history series; fetches on a session never overlap.
    pub async fn fetch_history(
        &self,
        session: &Session<D::Context>,
        instrument: &InstrumentRef,
        query: HistoryQuery,
    ) -> Result<Vec<RawSeriesPoint>, FetchError> {
        let _in_flight = session.gate.lock().await;
        if session.is_closed() {
            return Err(FetchError::source(format!(
                "scrape session {} is closed",
                session.id
            )));
        }

        debug!(
            session_id = session.id,
            instrument = %instrument.logical_key,
            period = %query.period,
            resolution = %query.resolution,
            points = query.points,
            "fetching scrape history"
        );

        let points = tokio::time::timeout(
            self.fetch_timeout,
            self.driver.history(&session.context, instrument, query),
        )
        .await
        .map_err(|_| {
            FetchError::fetch_timeout(format!(
                "no history for '{}' within {}ms",
                instrument.logical_key,
                self.fetch_timeout.as_millis()
            ))
        })?
        .map_err(into_scrape_error)?;

        if points.is_empty() {
            return Err(FetchError::empty_response(format!(
                "scrape source returned no points for '{}'",
                instrument.logical_key
            )));
        }

        Ok(points)
    }

    /// Releases the session. Returns `false` when it was already released.
    pub fn close(&self, session: &Session<D::Context>) -> bool {
        if session.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        self.driver.shutdown(&session.context);
        if let Ok(mut slot) = self.slot.try_lock() {
            if slot.as_ref().is_some_and(|open| open.id == session.id) {
                *slot = None;
            }
        }
        info!(session_id = session.id, "scrape session closed");
        true
    }
}

fn into_scrape_error(error: FetchError) -> FetchError {
    match error.kind() {
        ErrorKind::FetchTimeout | ErrorKind::EmptyResponse | ErrorKind::SourceError => error,
        _ => FetchError::source(error.message()),
    }
}

enum ScopeState<C> {
    Idle,
    Open(Arc<Session<C>>),
    Failed(FetchError),
    Closed,
}

/// Batch-scoped session guard.
///
/// Opens lazily on the first fetch, remembers an open failure so it is not
/// retried per instrument, and closes on [`SessionScope::close`] or drop.
pub struct SessionScope<'c, D: ScrapeDriver> {
    client: &'c ScrapeSessionClient<D>,
    state: ScopeState<D::Context>,
    opened: bool,
}

impl<'c, D: ScrapeDriver> SessionScope<'c, D> {
    pub fn new(client: &'c ScrapeSessionClient<D>) -> Self {
        Self {
            client,
            state: ScopeState::Idle,
            opened: false,
        }
    }

    async fn session(&mut self) -> Result<Arc<Session<D::Context>>, FetchError> {
        match &self.state {
            ScopeState::Open(session) => return Ok(Arc::clone(session)),
            ScopeState::Failed(error) => return Err(error.clone()),
            ScopeState::Closed => return Err(FetchError::source("scrape session scope is closed")),
            ScopeState::Idle => {}
        }

        match self.client.open().await {
            Ok(session) => {
                self.opened = true;
                self.state = ScopeState::Open(Arc::clone(&session));
                Ok(session)
            }
            Err(error) => {
                warn!(error = %error, "scrape session could not be opened");
                let error =
                    FetchError::source(format!("scrape session unavailable: {}", error.message()));
                self.state = ScopeState::Failed(error.clone());
                Err(error)
            }
        }
    }

    pub async fn fetch_history(
        &mut self,
        instrument: &InstrumentRef,
        query: HistoryQuery,
    ) -> Result<Vec<RawSeriesPoint>, FetchError> {
        let session = self.session().await?;
        self.client.fetch_history(&session, instrument, query).await
    }

    pub fn was_opened(&self) -> bool {
        self.opened
    }

    /// Closes the session if this scope opened one.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.state, ScopeState::Closed) {
            ScopeState::Open(session) => self.client.close(&session),
            _ => false,
        }
    }
}

impl<D: ScrapeDriver> Drop for SessionScope<'_, D> {
    fn drop(&mut self) {
        if self.close() {
            debug!("scrape session released on scope exit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AssetClass;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingDriver {
        launches: AtomicUsize,
        shutdowns: AtomicUsize,
    }

    impl ScrapeDriver for CountingDriver {
        type Context = ();

        fn launch(&self) -> DriverFuture<'_, ()> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }

        fn history<'a>(
            &'a self,
            _context: &'a (),
            _instrument: &'a InstrumentRef,
            _query: HistoryQuery,
        ) -> DriverFuture<'a, Vec<RawSeriesPoint>> {
            Box::pin(async { Ok(vec![RawSeriesPoint::complete(1, 1.0, 2.0, 0.5, 1.5, 10.0)]) })
        }

        fn shutdown(&self, _context: &()) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client(driver: &Arc<CountingDriver>) -> ScrapeSessionClient<CountingDriver> {
        ScrapeSessionClient::new(
            Arc::clone(driver),
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn open_is_idempotent_while_session_is_open() {
        let driver = Arc::new(CountingDriver::default());
        let client = client(&driver);

        let first = client.open().await.expect("open");
        let second = client.open().await.expect("open again");

        assert_eq!(first.id(), second.id());
        assert_eq!(driver.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_releases_exactly_once() {
        let driver = Arc::new(CountingDriver::default());
        let client = client(&driver);
        let session = client.open().await.expect("open");

        assert!(client.close(&session));
        assert!(!client.close(&session));
        assert_eq!(driver.shutdowns.load(Ordering::SeqCst), 1);

        let instrument =
            InstrumentRef::scrape("indices/vn", "41064", "VN-Index", AssetClass::Index)
                .expect("valid");
        let err = client
            .fetch_history(&session, &instrument, HistoryQuery::default())
            .await
            .expect_err("closed session must fail");
        assert_eq!(err.kind(), ErrorKind::SourceError);
    }

    #[tokio::test]
    async fn dropping_scope_closes_session() {
        let driver = Arc::new(CountingDriver::default());
        let client = client(&driver);
        let instrument =
            InstrumentRef::scrape("indices/vn", "41064", "VN-Index", AssetClass::Index)
                .expect("valid");

        {
            let mut scope = SessionScope::new(&client);
            scope
                .fetch_history(&instrument, HistoryQuery::default())
                .await
                .expect("history");
            assert!(scope.was_opened());
        }

        assert_eq!(driver.shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unopened_scope_never_launches() {
        let driver = Arc::new(CountingDriver::default());
        let client = client(&driver);

        let mut scope = SessionScope::new(&client);
        assert!(!scope.close());
        drop(scope);

        assert_eq!(driver.launches.load(Ordering::SeqCst), 0);
        assert_eq!(driver.shutdowns.load(Ordering::SeqCst), 0);
    }
}
