//! Request/response DTOs for the demo HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body for `POST /configure`: (re)builds the demo cache from scratch.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfigureRequest {
    /// Eviction threshold; omit or pass `null` for unbounded.
    #[serde(default)]
    pub maxsize: Option<usize>,
    /// Cache-wide default TTL in seconds; omit or pass `null` for none.
    #[serde(default)]
    pub default_ttl_secs: Option<u64>,
    /// Batch coalescing window in milliseconds.
    #[serde(default = "default_batch_window_ms")]
    pub batch_window_ms: u64,
    /// Batch coalescing size threshold.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_batch_window_ms() -> u64 {
    5
}

fn default_max_batch_size() -> usize {
    100
}

/// Echoes the configuration that took effect.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfigureResponse {
    pub status: &'static str,
    pub maxsize: Option<usize>,
    pub default_ttl_secs: Option<u64>,
    pub batch_window_ms: u64,
    pub max_batch_size: usize,
}

/// Body for `POST /call/single` and `POST /call/batch`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CallRequest {
    /// The key to look up, loading through a simulated 100ms upstream call
    /// on a miss.
    pub key: String,
}

/// Result of a `/call/*` lookup.
#[derive(Debug, Serialize, ToSchema)]
pub struct CallResponse {
    pub key: String,
    pub value: String,
    /// `"single"` or `"batch"`, the coalescing strategy that served the miss.
    pub via: &'static str,
}

/// Body for `POST /set`.
///
/// `ttl_secs` uses the missing-vs-`null`-vs-value distinction: omitting the
/// field falls back to the cache's default TTL, an explicit JSON `null`
/// means "never expire", and a number pins an explicit TTL.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub ttl_secs: Option<Option<u64>>,
}

/// Body for `POST /delete`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteRequest {
    pub key: String,
}

/// Body for `POST /warmup`: populates every key in `keys` that is not
/// already present, via the simulated upstream loader.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WarmupRequest {
    pub keys: Vec<String>,
}

/// Result of `/warmup`.
#[derive(Debug, Serialize, ToSchema)]
pub struct WarmupResponse {
    pub status: &'static str,
    pub keys: Vec<String>,
    pub metrics: MetricsResponse,
}

/// A cache effectiveness snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct MetricsResponse {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub hit_rate: f64,
}

impl From<concache_core::Metrics> for MetricsResponse {
    fn from(metrics: concache_core::Metrics) -> Self {
        Self {
            hits: metrics.hits,
            misses: metrics.misses,
            size: metrics.size,
            hit_rate: metrics.hit_rate,
        }
    }
}

/// Generic status acknowledgement (`/clear`, `/delete`).
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// A failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
