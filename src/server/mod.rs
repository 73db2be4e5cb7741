pub mod api;

use crate::pipeline::Pipeline;
use crate::services::{CoinGeckoClient, InsightsClient, RateGate};
use crate::utils::{get_charts_dir, get_reports_dir};
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Start the axum server
pub async fn serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting crypto-analyst server");

    // one gate shared by every pipeline run keeps the whole process
    // under the provider's free-tier budget
    let gate = RateGate::default();
    let gateway = Arc::new(CoinGeckoClient::from_env(gate)?);
    let insights = InsightsClient::from_env()?;

    let reports_dir = get_reports_dir();
    let charts_dir = get_charts_dir();
    std::fs::create_dir_all(&charts_dir)?;
    tracing::info!("Using reports directory: {}", reports_dir.display());

    let pipeline = Pipeline::new(gateway, insights, reports_dir.clone());
    let app_state = AppState {
        pipeline: Arc::new(pipeline),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    tracing::info!("Registering routes:");
    tracing::info!("  GET  /");
    tracing::info!("  GET  /health");
    tracing::info!("  POST /analyze");
    tracing::info!("  GET  /reports/* (static files from {})", reports_dir.display());

    let app = Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route("/analyze", post(api::analyze_handler))
        .nest_service("/reports", ServeDir::new(reports_dir))
        .layer(cors)
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
