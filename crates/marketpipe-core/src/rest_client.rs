//! Stateless client for the REST aggregation endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::http_client::{HttpClient, HttpErrorKind, HttpRequest, ReqwestHttpClient};
use crate::FetchError;

const MAX_BODY_IN_MESSAGE: usize = 256;

/// One request per call; no retries and no state between calls.
#[derive(Clone)]
pub struct RestQuoteClient {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
}

impl RestQuoteClient {
    pub fn new(base_url: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http_client,
        }
    }

    pub fn with_reqwest(base_url: impl Into<String>) -> Self {
        Self::new(base_url, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint_path: &str) -> String {
        let path = endpoint_path.trim();
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Issues `GET {base_url}{endpoint_path}` and returns the parsed JSON body.
    ///
    /// # Errors
    ///
    /// - `Timeout` when the call exceeds `timeout_ms`
    /// - `HttpError(status)` for a non-2xx response
    /// - `NetworkError` for connection-level failures
    /// - `SchemaMismatch` when a 2xx body is not JSON
    pub async fn fetch_aggregate(
        &self,
        endpoint_path: &str,
        timeout_ms: u64,
    ) -> Result<Value, FetchError> {
        let url = self.url_for(endpoint_path);
        let request = HttpRequest::get(&url)
            .with_header("accept", "application/json")
            .with_timeout_ms(timeout_ms);

        debug!(%url, timeout_ms, "requesting rest aggregate");

        let response = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            self.http_client.execute(request),
        )
        .await
        .map_err(|_| FetchError::timeout(format!("GET {url} exceeded {timeout_ms}ms")))?
        .map_err(|error| match error.kind() {
            HttpErrorKind::Timeout => {
                FetchError::timeout(format!("GET {url} timed out: {}", error.message()))
            }
            HttpErrorKind::Connect | HttpErrorKind::Other => {
                FetchError::network(format!("GET {url} failed: {}", error.message()))
            }
        })?;

        if !response.is_success() {
            return Err(FetchError::http(
                response.status,
                format!(
                    "GET {url} returned status {}: {}",
                    response.status,
                    truncate(&response.body)
                ),
            ));
        }

        serde_json::from_str(&response.body).map_err(|error| {
            FetchError::schema_mismatch(format!("GET {url} returned a non-JSON body: {error}"))
        })
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_IN_MESSAGE) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}
