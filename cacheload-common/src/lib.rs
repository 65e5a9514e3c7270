use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for cacheload operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheLoadError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {0}: {1}")]
    HttpError(u16, String),

    #[error("Cache warmup failed: {0}")]
    SetupFailed(String),

    #[error("Malformed metrics report: {0}")]
    MalformedReport(String),
}

/// Result type for cacheload operations
pub type Result<T> = std::result::Result<T, CacheLoadError>;

/// Top-level envelope of `GET /api/cache/metrics/report`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetricsReport {
    pub payload: ReportPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPayload {
    pub redis_metrics: RedisMetrics,
    pub summary: ReportSummary,
}

/// Redis-tier statistics as reported by the service. `hit_rate` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedisMetrics {
    pub hit_rate: f64,
}

/// Cross-tier statistics. `overall_hit_rate` is a fraction in `[0, 1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub overall_hit_rate: f64,
}
