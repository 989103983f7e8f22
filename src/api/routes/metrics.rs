//! Metrics Routes
//!
//! - GET /api/metrics - List metrics (skip, limit, search, category, status)
//! - POST /api/metrics - Create a metric
//! - GET /api/metrics/stats - Counts by status
//! - GET /api/metrics/:id - Get a metric
//! - PUT /api/metrics/:id - Partially update a metric
//! - DELETE /api/metrics/:id - Delete a metric and its data points
//! - GET /api/metrics/:id/timeseries - Latest points, oldest first
//! - POST /api/metrics/:id/datapoints - Record a data point

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ListParams, MessageResponse, TimeSeriesParams};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{
    DataPointCreate, Metric, MetricCreate, MetricDataPoint, MetricStats, MetricUpdate, Page,
    TimeSeriesPoint,
};
use crate::service::{MetricService, ServiceError, StatsService};

/// GET /api/metrics
pub async fn list_metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Metric>>> {
    let pagination = params.pagination()?;
    let filter = params.metric_filter();

    let page = state
        .db
        .run(move |conn| MetricService::list(conn, pagination, &filter))
        .await?;

    Ok(Json(page))
}

/// GET /api/metrics/stats
pub async fn metric_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<MetricStats>> {
    let stats = state.db.run(StatsService::metric_stats).await?;
    Ok(Json(stats))
}

/// GET /api/metrics/:id
pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Metric>> {
    let metric = state
        .db
        .run(move |conn| MetricService::get(conn, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Metric", id))?;

    Ok(Json(metric))
}

/// POST /api/metrics
pub async fn create_metric(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MetricCreate>,
) -> ApiResult<(StatusCode, Json<Metric>)> {
    let metric = state
        .db
        .run(move |conn| MetricService::create(conn, req))
        .await?;

    Ok((StatusCode::CREATED, Json(metric)))
}

/// PUT /api/metrics/:id
pub async fn update_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<MetricUpdate>,
) -> ApiResult<Json<Metric>> {
    let metric = state
        .db
        .run(move |conn| MetricService::update(conn, id, req))
        .await?
        .ok_or_else(|| ApiError::not_found("Metric", id))?;

    Ok(Json(metric))
}

/// DELETE /api/metrics/:id
pub async fn delete_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state
        .db
        .run(move |conn| MetricService::delete(conn, id))
        .await?;

    if !deleted {
        return Err(ApiError::not_found("Metric", id));
    }
    Ok(Json(MessageResponse::new("Metric deleted successfully")))
}

/// GET /api/metrics/:id/timeseries
pub async fn metric_timeseries(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<TimeSeriesParams>,
) -> ApiResult<Json<Vec<TimeSeriesPoint>>> {
    let limit = params.limit()?;

    let series = state
        .db
        .run(move |conn| -> Result<_, ServiceError> {
            if !MetricService::exists(conn, id)? {
                return Ok(None);
            }
            StatsService::timeseries(conn, id, limit).map(Some)
        })
        .await?
        .ok_or_else(|| ApiError::not_found("Metric", id))?;

    Ok(Json(series))
}

/// POST /api/metrics/:id/datapoints
pub async fn record_datapoint(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<DataPointCreate>,
) -> ApiResult<(StatusCode, Json<MetricDataPoint>)> {
    let point = state
        .db
        .run(move |conn| MetricService::record_point(conn, id, req))
        .await?
        .ok_or_else(|| ApiError::not_found("Metric", id))?;

    Ok((StatusCode::CREATED, Json(point)))
}
