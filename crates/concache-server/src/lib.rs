//! HTTP demo surface for `concache-core`: a `CacheFacade<String, String>`
//! behind `axum` state, exercised through single-loader and batch-loader
//! lookups against a simulated upstream.
//!
//! ## OpenAPI documentation
//!
//! - Swagger UI: `GET /swagger-ui`
//! - OpenAPI JSON: `GET /api-docs/openapi.json`

pub mod config;
mod handlers;
mod types;

use std::sync::Arc;

use concache_core::CacheFacade;
use tokio::sync::RwLock;
use utoipa::OpenApi;

pub use config::ServerConfig;
pub use handlers::{call_batch, call_single, clear, configure, delete, health_check, metrics, set, warmup};
pub use types::*;

/// Shared application state: the one cache instance every handler reads
/// or replaces. `RwLock` rather than a plain `Mutex` because `/configure`
/// is the only writer; every lookup handler only needs a read lock to
/// clone the current `Arc<CacheFacade<..>>` out.
pub struct AppState {
    pub cache: RwLock<Arc<CacheFacade<String, String>>>,
}

impl AppState {
    /// Builds state from a starting cache configuration.
    #[must_use]
    pub fn new(config: concache_core::CacheConfig) -> Self {
        Self {
            cache: RwLock::new(Arc::new(CacheFacade::new(config))),
        }
    }
}

/// OpenAPI documentation for the demo surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "ConCache demo server",
        version = "0.1.0",
        description = "Interactive demo of bounded LRU retention, single-flight, and batch coalescing."
    ),
    tags(
        (name = "health", description = "Health check"),
        (name = "cache", description = "Cache configuration and lookups")
    ),
    paths(
        handlers::health::health_check,
        handlers::cache::configure,
        handlers::cache::call_single,
        handlers::cache::call_batch,
        handlers::cache::set,
        handlers::cache::delete,
        handlers::cache::clear,
        handlers::cache::warmup,
        handlers::cache::metrics,
    ),
    components(schemas(
        ConfigureRequest,
        ConfigureResponse,
        CallRequest,
        CallResponse,
        SetRequest,
        DeleteRequest,
        WarmupRequest,
        WarmupResponse,
        MetricsResponse,
        StatusResponse,
        ErrorResponse,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_spec_generates() {
        let openapi = ApiDoc::openapi();
        let json = openapi.to_json().expect("OpenAPI spec must serialize");
        assert!(json.contains("ConCache demo server"));
    }
}
