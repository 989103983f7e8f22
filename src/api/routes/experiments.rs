//! Experiment Routes
//!
//! - GET /api/experiments - List experiments, newest first (skip, limit, search, status)
//! - POST /api/experiments - Create an experiment
//! - GET /api/experiments/:id - Get an experiment
//! - PUT /api/experiments/:id - Partially update an experiment
//! - DELETE /api/experiments/:id - Delete an experiment

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ListParams, MessageResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Experiment, ExperimentCreate, ExperimentUpdate, Page};
use crate::service::ExperimentService;

/// GET /api/experiments
pub async fn list_experiments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Experiment>>> {
    let pagination = params.pagination()?;
    let filter = params.experiment_filter();

    let page = state
        .db
        .run(move |conn| ExperimentService::list(conn, pagination, &filter))
        .await?;

    Ok(Json(page))
}

/// GET /api/experiments/:id
pub async fn get_experiment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Experiment>> {
    let experiment = state
        .db
        .run(move |conn| ExperimentService::get(conn, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Experiment", id))?;

    Ok(Json(experiment))
}

/// POST /api/experiments
///
/// Answers 409 when the target segment does not exist.
pub async fn create_experiment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExperimentCreate>,
) -> ApiResult<(StatusCode, Json<Experiment>)> {
    let experiment = state
        .db
        .run(move |conn| ExperimentService::create(conn, req))
        .await?;

    Ok((StatusCode::CREATED, Json(experiment)))
}

/// PUT /api/experiments/:id
pub async fn update_experiment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<ExperimentUpdate>,
) -> ApiResult<Json<Experiment>> {
    let experiment = state
        .db
        .run(move |conn| ExperimentService::update(conn, id, req))
        .await?
        .ok_or_else(|| ApiError::not_found("Experiment", id))?;

    Ok(Json(experiment))
}

/// DELETE /api/experiments/:id
pub async fn delete_experiment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state
        .db
        .run(move |conn| ExperimentService::delete(conn, id))
        .await?;

    if !deleted {
        return Err(ApiError::not_found("Experiment", id));
    }
    Ok(Json(MessageResponse::new("Experiment deleted successfully")))
}
