//! Demo endpoints exercising the shared [`AppState`] cache: a simulated
//! 100ms upstream call, single-loader vs. batch-loader lookups, and
//! metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use concache_core::batch::{BatchLoaderFn, BatchResult, LoaderId};
use concache_core::{single_loader, CacheConfig, CacheError, TtlSetting};

use crate::types::{
    CallRequest, CallResponse, ConfigureRequest, ConfigureResponse, DeleteRequest,
    ErrorResponse, MetricsResponse, SetRequest, StatusResponse, WarmupRequest, WarmupResponse,
};
use crate::AppState;

/// The single demo batch loader's identity; this server only ever wires up
/// one batch loader, so a fixed id is enough to distinguish it from any
/// other `BatchCoalescer` user (there is none here).
const BATCH_LOADER_ID: LoaderId = 1;

const SIMULATED_UPSTREAM_LATENCY: Duration = Duration::from_millis(100);

async fn simulate_data_load(key: String) -> Result<String, CacheError> {
    tokio::time::sleep(SIMULATED_UPSTREAM_LATENCY).await;
    Ok(format!("data-for-{key}"))
}

fn batch_loader() -> BatchLoaderFn<String, String> {
    Arc::new(|keys: Vec<String>| {
        Box::pin(async move {
            tokio::time::sleep(SIMULATED_UPSTREAM_LATENCY).await;
            let values = keys.into_iter().map(|k| Some(format!("data-for-{k}"))).collect();
            Ok(BatchResult::Ordered(values))
        })
    })
}

fn loader_error(err: CacheError) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: err.to_string() }),
    )
}

/// Rebuilds the demo cache from scratch with the given configuration.
#[utoipa::path(
    post,
    path = "/configure",
    tag = "cache",
    request_body = ConfigureRequest,
    responses((status = 200, description = "Cache reconfigured", body = ConfigureResponse))
)]
pub async fn configure(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfigureRequest>,
) -> impl IntoResponse {
    let config = CacheConfig::default()
        .with_maxsize(req.maxsize.and_then(std::num::NonZeroUsize::new))
        .with_default_ttl(req.default_ttl_secs.map(Duration::from_secs))
        .with_batch(
            Duration::from_millis(req.batch_window_ms),
            std::num::NonZeroUsize::new(req.max_batch_size)
                .unwrap_or_else(|| std::num::NonZeroUsize::new(100).expect("100 is non-zero")),
        );

    let response = ConfigureResponse {
        status: "configured",
        maxsize: req.maxsize,
        default_ttl_secs: req.default_ttl_secs,
        batch_window_ms: req.batch_window_ms,
        max_batch_size: req.max_batch_size,
    };

    *state.cache.write().await = Arc::new(concache_core::CacheFacade::new(config));
    Json(response)
}

/// Looks up `key`, coalescing concurrent misses on the same key through
/// single-flight.
#[utoipa::path(
    post,
    path = "/call/single",
    tag = "cache",
    request_body = CallRequest,
    responses(
        (status = 200, description = "Lookup result", body = CallResponse),
        (status = 500, description = "Loader failed", body = ErrorResponse)
    )
)]
pub async fn call_single(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallRequest>,
) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    let key = req.key.clone();
    let loader = single_loader(move || simulate_data_load(key));
    match cache.get(req.key.clone(), Some(loader), None, TtlSetting::Unset).await {
        Ok(value) => Json(CallResponse {
            key: req.key,
            value: value.expect("single-loader get always resolves to Some"),
            via: "single",
        })
        .into_response(),
        Err(err) => loader_error(err).into_response(),
    }
}

/// Looks up `key` through the batch loader, coalescing concurrent misses
/// across different keys into one upstream call.
#[utoipa::path(
    post,
    path = "/call/batch",
    tag = "cache",
    request_body = CallRequest,
    responses(
        (status = 200, description = "Lookup result", body = CallResponse),
        (status = 500, description = "Loader failed", body = ErrorResponse)
    )
)]
pub async fn call_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CallRequest>,
) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    let result = cache
        .get(req.key.clone(), None, Some((BATCH_LOADER_ID, batch_loader())), TtlSetting::Unset)
        .await;
    match result {
        Ok(value) => Json(CallResponse {
            key: req.key,
            value: value.expect("batch loader always resolves to Some for these keys"),
            via: "batch",
        })
        .into_response(),
        Err(err) => loader_error(err).into_response(),
    }
}

/// Inserts or updates a key directly, bypassing any loader.
#[utoipa::path(
    post,
    path = "/set",
    tag = "cache",
    request_body = SetRequest,
    responses((status = 200, description = "Key stored", body = StatusResponse))
)]
pub async fn set(State(state): State<Arc<AppState>>, Json(req): Json<SetRequest>) -> impl IntoResponse {
    let ttl = match req.ttl_secs {
        None => TtlSetting::Unset,
        Some(None) => TtlSetting::ExplicitNone,
        Some(Some(secs)) => TtlSetting::ExplicitSeconds(secs),
    };
    let cache = state.cache.read().await.clone();
    cache.set(req.key, req.value, ttl);
    Json(StatusResponse { status: "set" })
}

/// Removes a key if present.
#[utoipa::path(
    post,
    path = "/delete",
    tag = "cache",
    request_body = DeleteRequest,
    responses((status = 200, description = "Key removed", body = StatusResponse))
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    cache.delete(&req.key);
    Json(StatusResponse { status: "deleted" })
}

/// Removes every entry and resets metrics.
#[utoipa::path(
    post,
    path = "/clear",
    tag = "cache",
    responses((status = 200, description = "Cache cleared", body = StatusResponse))
)]
pub async fn clear(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    cache.clear();
    Json(StatusResponse { status: "cleared" })
}

/// Populates every key in `keys` not already present, sequentially, via
/// the simulated upstream loader.
#[utoipa::path(
    post,
    path = "/warmup",
    tag = "cache",
    request_body = WarmupRequest,
    responses((status = 200, description = "Warmup complete", body = WarmupResponse))
)]
pub async fn warmup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WarmupRequest>,
) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    let entries = req.keys.clone().into_iter().map(|k| {
        let loader_key = k.clone();
        (k, single_loader(move || simulate_data_load(loader_key)))
    });

    match cache.warmup(entries).await {
        Ok(()) => Json(WarmupResponse {
            status: "warmed",
            keys: req.keys,
            metrics: MetricsResponse::from(cache.metrics()),
        })
        .into_response(),
        Err(err) => loader_error(err).into_response(),
    }
}

/// Returns the current hit/miss/size snapshot.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "cache",
    responses((status = 200, description = "Current metrics", body = MetricsResponse))
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = state.cache.read().await.clone();
    Json(MetricsResponse::from(cache.metrics()))
}
