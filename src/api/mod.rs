//! DataHub REST API
//!
//! HTTP API layer for DataHub, built with Axum.
//!
//! # Endpoints
//!
//! ## Metrics
//! - `GET /api/metrics` - List metrics
//! - `POST /api/metrics` - Create a metric
//! - `GET /api/metrics/stats` - Counts by status
//! - `GET /api/metrics/:id` - Get a metric
//! - `PUT /api/metrics/:id` - Update a metric
//! - `DELETE /api/metrics/:id` - Delete a metric
//! - `GET /api/metrics/:id/timeseries` - Metric history
//! - `POST /api/metrics/:id/datapoints` - Record a data point
//!
//! ## Segments
//! - `GET /api/segments` - List segments
//! - `POST /api/segments` - Create a segment
//! - `GET /api/segments/stats` - Customer totals
//! - `GET /api/segments/:id` - Get a segment
//! - `PUT /api/segments/:id` - Update a segment
//! - `DELETE /api/segments/:id` - Delete a segment
//! - `POST /api/segments/:id/campaigns/:campaign_id` - Link a campaign
//! - `DELETE /api/segments/:id/campaigns/:campaign_id` - Unlink a campaign
//!
//! ## Campaigns
//! - `GET /api/campaigns` - List campaigns
//! - `POST /api/campaigns` - Create a campaign
//! - `GET /api/campaigns/:id` - Get a campaign
//!
//! ## Experiments
//! - `GET /api/experiments` - List experiments, newest first
//! - `POST /api/experiments` - Create an experiment
//! - `GET /api/experiments/:id` - Get an experiment
//! - `PUT /api/experiments/:id` - Update an experiment
//! - `DELETE /api/experiments/:id` - Delete an experiment
//!
//! ## Health
//! - `GET /` - Welcome message
//! - `GET /health` - Health status
//!
//! # Example
//!
//! ```rust,ignore
//! use datahub::api::{serve, AppState};
//! use datahub::config::Config;
//! use datahub::store::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default().config;
//!     let db = Arc::new(Database::open(config.database.store_config())?);
//!
//!     let state = AppState::new(db, config.api.clone());
//!     serve(state, &config.api).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Metric routes
        .route(
            "/metrics",
            get(routes::metrics::list_metrics).post(routes::metrics::create_metric),
        )
        .route("/metrics/stats", get(routes::metrics::metric_stats))
        .route(
            "/metrics/:id",
            get(routes::metrics::get_metric)
                .put(routes::metrics::update_metric)
                .delete(routes::metrics::delete_metric),
        )
        .route(
            "/metrics/:id/timeseries",
            get(routes::metrics::metric_timeseries),
        )
        .route(
            "/metrics/:id/datapoints",
            post(routes::metrics::record_datapoint),
        )
        // Segment routes
        .route(
            "/segments",
            get(routes::segments::list_segments).post(routes::segments::create_segment),
        )
        .route("/segments/stats", get(routes::segments::segment_stats))
        .route(
            "/segments/:id",
            get(routes::segments::get_segment)
                .put(routes::segments::update_segment)
                .delete(routes::segments::delete_segment),
        )
        .route(
            "/segments/:id/campaigns/:campaign_id",
            post(routes::segments::link_campaign).delete(routes::segments::unlink_campaign),
        )
        // Campaign routes
        .route(
            "/campaigns",
            get(routes::campaigns::list_campaigns).post(routes::campaigns::create_campaign),
        )
        .route("/campaigns/:id", get(routes::campaigns::get_campaign))
        // Experiment routes
        .route(
            "/experiments",
            get(routes::experiments::list_experiments)
                .post(routes::experiments::create_experiment),
        )
        .route(
            "/experiments/:id",
            get(routes::experiments::get_experiment)
                .put(routes::experiments::update_experiment)
                .delete(routes::experiments::delete_experiment),
        );

    let cors = cors_layer(&state.config.cors_origins);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .route("/", get(routes::health::root))
        .route("/health", get(routes::health::health))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// CORS restricted to the configured origins; `*` allows any origin
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
pub async fn serve(state: AppState, config: &ApiConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("DataHub API listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("DataHub API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
