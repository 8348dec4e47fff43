mod api;
mod cache;
mod config;
mod snapshot;
mod tracks;
mod weather;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::tracks::SnapshotFeed;
use crate::weather::WeatherService;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub feed: Arc<SnapshotFeed>,
    pub weather: Arc<WeatherService>,
    pub cache: Arc<ResponseCache>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Arc::new(Config::from_env()?);

    let client = reqwest::Client::builder()
        .user_agent("balloon-api/1.0")
        .connect_timeout(Duration::from_secs(8))
        .build()
        .context("Failed to build reqwest client")?;

    let state = AppState {
        feed: Arc::new(SnapshotFeed::new(
            client.clone(),
            cfg.feed_base_url.clone(),
            cfg.fetch_timeout,
        )),
        weather: Arc::new(WeatherService::new(client, cfg.weather_endpoint.clone())),
        cache: Arc::new(ResponseCache::new(cfg.cache_ttl)),
        cfg: cfg.clone(),
    };

    let app = Router::new()
        .route("/healthz", get(api::healthz))
        .route("/api/dashboard", get(api::dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.listen_addr))?;

    info!("balloon-api listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
