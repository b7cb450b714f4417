//! Blue Carbon Registry service — entry point.
//!
//! Serves the read-only restoration project dataset and hosts the two
//! simulated workflows of the monitoring dashboard (image analysis and
//! carbon credit issuance) behind a small Axum REST API.

mod api;
mod config;
mod dataset;
mod errors;
mod models;
mod workflow;

#[cfg(test)]
mod test_workflows;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;
use dataset::Dataset;
use workflow::analysis::ImageAnalysis;
use workflow::issuance::CreditIssuance;
use workflow::{MetricsProvider, RandomMetrics, Sessions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    let dataset = Arc::new(Dataset::load(config.dataset_path.as_deref())?);

    // Cancelled on shutdown; every session and run token descends from it.
    let shutdown = CancellationToken::new();
    let metrics: Arc<dyn MetricsProvider> = match config.metrics_seed {
        Some(seed) => {
            info!("Fabricated results seeded with {seed}");
            Arc::new(RandomMetrics::seeded(seed))
        }
        None => Arc::new(RandomMetrics::from_entropy()),
    };

    let state = Arc::new(ApiState {
        dataset,
        analysis: Sessions::new(
            ImageAnalysis::new(&config.timing)?,
            Arc::clone(&metrics),
            shutdown.clone(),
        ),
        issuance: Sessions::new(
            CreditIssuance::new(&config.timing, config.credit_price)?,
            metrics,
            shutdown.clone(),
        ),
    });

    // ─── REST API ─────────────────────────────────────────
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/projects", get(api::list_projects))
        .route("/projects/:id", get(api::get_project))
        .route("/projects/:id/credits/estimate", get(api::estimate_credits))
        .route("/notifications", get(api::list_notifications))
        .route("/stats", get(api::statistics))
        .route("/issuance/projects", get(api::issuable_projects))
        // Image analysis sessions
        .route("/analysis", post(api::create_session::<ImageAnalysis>))
        .route(
            "/analysis/:id",
            get(api::get_session::<ImageAnalysis>).delete(api::delete_session::<ImageAnalysis>),
        )
        .route("/analysis/:id/selection", put(api::select_analysis_project))
        .route("/analysis/:id/attachments", put(api::set_attachments))
        .route("/analysis/:id/start", post(api::start_session::<ImageAnalysis>))
        .route("/analysis/:id/reset", post(api::reset_session::<ImageAnalysis>))
        // Credit issuance sessions
        .route("/issuance", post(api::create_session::<CreditIssuance>))
        .route(
            "/issuance/:id",
            get(api::get_session::<CreditIssuance>).delete(api::delete_session::<CreditIssuance>),
        )
        .route("/issuance/:id/selection", put(api::select_issuance_project))
        .route("/issuance/:id/start", post(api::start_session::<CreditIssuance>))
        .route("/issuance/:id/reset", post(api::reset_session::<CreditIssuance>))
        .route("/issuance/:id/transaction", get(api::transaction_hash))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, cancelling every pending workflow run first.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, cancelling workflow runs");
    shutdown.cancel();
}
