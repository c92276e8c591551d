//! ConCache demo server - HTTP dashboard over `concache-core`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use concache_server::{
    call_batch, call_single, clear, configure, delete, health_check, metrics, set, warmup,
    ApiDoc, AppState, ServerConfig,
};

/// ConCache demo server
#[derive(Parser, Debug)]
#[command(name = "concache-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a `concache-server.toml` configuration file.
    #[arg(short, long, default_value = "concache-server.toml", env = "CONCACHE_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = ServerConfig::load_from_path(&args.config)?;
    config.validate()?;

    tracing::info!(host = %config.host, port = config.port, "starting concache-server");

    let state = Arc::new(AppState::new((&config.cache).into()));

    let api_router = Router::new()
        .route("/health", get(health_check))
        .route("/configure", post(configure))
        .route("/call/single", post(call_single))
        .route("/call/batch", post(call_batch))
        .route("/set", post(set))
        .route("/delete", post(delete))
        .route("/clear", post(clear))
        .route("/warmup", post(warmup))
        .route("/metrics", get(metrics))
        .with_state(state);

    let swagger_ui = SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi());

    let app = api_router
        .merge(Router::<()>::new().merge(swagger_ui))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("concache-server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
