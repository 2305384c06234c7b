pub mod config;
pub mod request_id;
pub mod routes;

use analysis_core::EngineConfig;
use analysis_orchestrator::AnalysisOrchestrator;
use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, Method};
use axum::{middleware, Router};
use market_data::YahooFinanceClient;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
}

impl AppState {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn cors_layer(allow_origins: &[String]) -> Result<CorsLayer> {
    if allow_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = allow_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid origin in ANALYZER_ALLOW_ORIGINS: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

pub fn build_router(state: AppState, config: &ServerConfig) -> Result<Router> {
    Ok(routes::analysis_routes()
        .layer(middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allow_origins)?)
        .with_state(state))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}

pub async fn run_server() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env()?;
    let provider = Arc::new(YahooFinanceClient::new()?);
    let engine_config = EngineConfig::default().with_monte_carlo_iterations(config.monte_carlo_iterations);
    let orchestrator = AnalysisOrchestrator::new(provider, engine_config).with_cache_ttl(config.cache_ttl_secs);
    let app = build_router(AppState::new(orchestrator), &config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(
        "Valuation API listening on {} (cache TTL {}s, {} Monte Carlo trials)",
        config.bind_addr,
        config.cache_ttl_secs,
        config.monte_carlo_iterations
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}
