use std::time::Duration;

use cacheload_common::{CacheLoadError, CacheMetricsReport, Result};

/// Cache API client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the service under test, e.g. `http://localhost:8080`.
    pub base_url: String,
}

/// Thin HTTP client for the cache API under test.
///
/// Every method issues exactly one request and returns the response status
/// code; callers decide what counts as success. Transport failures map to
/// [`CacheLoadError::NetworkError`] and elapsed per-request timeouts to
/// [`CacheLoadError::Timeout`] — the client never panics on a bad response.
pub struct CacheClient {
    pub config: ClientConfig,
    http_client: reqwest::Client,
}

impl CacheClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Build the full URL for an API path such as `/api/cache/warmup`.
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// POST `/api/cache/warmup`. Blocks until the service answers or `timeout` elapses.
    pub async fn warm_cache(&self, timeout: Duration) -> Result<u16> {
        let url = self.build_url("/api/cache/warmup");
        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        drain_body(response, timeout).await
    }

    /// GET `/api/cache/users/{user_id}`.
    pub async fn fetch_user(&self, user_id: &str, timeout: Duration) -> Result<u16> {
        self.get_status(&format!("/api/cache/users/{user_id}"), timeout)
            .await
    }

    /// GET `/api/cache/products/{product_id}`.
    pub async fn fetch_product(&self, product_id: &str, timeout: Duration) -> Result<u16> {
        self.get_status(&format!("/api/cache/products/{product_id}"), timeout)
            .await
    }

    /// GET `/api/cache/hotdata/{key}`.
    pub async fn fetch_hot_item(&self, key: &str, timeout: Duration) -> Result<u16> {
        self.get_status(&format!("/api/cache/hotdata/{key}"), timeout)
            .await
    }

    /// POST `/api/cache/users/batch` with a JSON array of user IDs.
    pub async fn batch_users(&self, user_ids: &[String], timeout: Duration) -> Result<u16> {
        let url = self.build_url("/api/cache/users/batch");
        let response = self
            .http_client
            .post(&url)
            .json(user_ids)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        drain_body(response, timeout).await
    }

    /// GET `/api/cache/metrics/report` and parse the JSON body.
    ///
    /// Returns `HttpError` for a non-2xx status and `MalformedReport` when the
    /// body does not match the expected payload shape.
    pub async fn metrics_report(&self, timeout: Duration) -> Result<CacheMetricsReport> {
        let url = self.build_url("/api/cache/metrics/report");
        let response = self
            .http_client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheLoadError::HttpError(
                status.as_u16(),
                format!("metrics report returned status {status}"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CacheLoadError::NetworkError(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| CacheLoadError::MalformedReport(e.to_string()))
    }

    /// GET `path`, draining the body, mapping errors into the common taxonomy.
    async fn get_status(&self, path: &str, timeout: Duration) -> Result<u16> {
        let url = self.build_url(path);
        let response = self
            .http_client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        drain_body(response, timeout).await
    }
}

/// Read the response body to completion and return the status code.
///
/// A response is not done when its headers arrive: latency measurements and
/// the per-request timeout must cover the body download too, so a stalled or
/// slow body surfaces as a transport error instead of a fast success.
async fn drain_body(response: reqwest::Response, timeout: Duration) -> Result<u16> {
    let status = response.status().as_u16();
    response
        .bytes()
        .await
        .map_err(|e| map_transport_error(e, timeout))?;
    Ok(status)
}

/// Classify a reqwest error: an elapsed per-request timeout maps to `Timeout`,
/// everything else (DNS, refused connection, broken stream) to `NetworkError`.
fn map_transport_error(e: reqwest::Error, timeout: Duration) -> CacheLoadError {
    if e.is_timeout() {
        CacheLoadError::Timeout(timeout.as_millis() as u64)
    } else {
        CacheLoadError::NetworkError(e.to_string())
    }
}
