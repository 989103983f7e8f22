//! Health Routes
//!
//! - GET / - Welcome message
//! - GET /health - Health status with a database probe

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, MessageResponse};
use crate::api::state::AppState;

/// GET /
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to DataHub API"))
}

/// GET /health
///
/// Returns 503 when the database cannot be reached.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let db = Arc::clone(&state.db);
    let database_ok = match tokio::task::spawn_blocking(move || db.ping()).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Database health probe failed");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Database health probe did not complete");
            false
        }
    };

    let (status, overall) = if database_ok {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(HealthResponse {
            status: overall.to_string(),
            database: if database_ok { "ok" } else { "error" }.to_string(),
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
