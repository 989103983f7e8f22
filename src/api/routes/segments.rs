//! Segment Routes
//!
//! - GET /api/segments - List segments (skip, limit, search, category)
//! - POST /api/segments - Create a segment, optionally linking campaigns
//! - GET /api/segments/stats - Segment and customer totals
//! - GET /api/segments/:id - Get a segment with its campaigns
//! - PUT /api/segments/:id - Partially update a segment
//! - DELETE /api/segments/:id - Delete a segment (campaigns are kept)
//! - POST /api/segments/:id/campaigns/:campaign_id - Link a campaign
//! - DELETE /api/segments/:id/campaigns/:campaign_id - Unlink a campaign

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::{ListParams, MessageResponse};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Page, Segment, SegmentCreate, SegmentStats, SegmentUpdate};
use crate::service::{SegmentService, StatsService};

/// GET /api/segments
pub async fn list_segments(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Segment>>> {
    let pagination = params.pagination()?;
    let filter = params.segment_filter();

    let page = state
        .db
        .run(move |conn| SegmentService::list(conn, pagination, &filter))
        .await?;

    Ok(Json(page))
}

/// GET /api/segments/stats
pub async fn segment_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<SegmentStats>> {
    let stats = state.db.run(StatsService::segment_stats).await?;
    Ok(Json(stats))
}

/// GET /api/segments/:id
pub async fn get_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Segment>> {
    let segment = state
        .db
        .run(move |conn| SegmentService::get(conn, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Segment", id))?;

    Ok(Json(segment))
}

/// POST /api/segments
pub async fn create_segment(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SegmentCreate>,
) -> ApiResult<(StatusCode, Json<Segment>)> {
    let segment = state
        .db
        .run(move |conn| SegmentService::create(conn, req))
        .await?;

    Ok((StatusCode::CREATED, Json(segment)))
}

/// PUT /api/segments/:id
pub async fn update_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<SegmentUpdate>,
) -> ApiResult<Json<Segment>> {
    let segment = state
        .db
        .run(move |conn| SegmentService::update(conn, id, req))
        .await?
        .ok_or_else(|| ApiError::not_found("Segment", id))?;

    Ok(Json(segment))
}

/// DELETE /api/segments/:id
///
/// Answers 409 while experiments still target the segment.
pub async fn delete_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<MessageResponse>> {
    let deleted = state
        .db
        .run(move |conn| SegmentService::delete(conn, id))
        .await?;

    if !deleted {
        return Err(ApiError::not_found("Segment", id));
    }
    Ok(Json(MessageResponse::new("Segment deleted successfully")))
}

/// POST /api/segments/:id/campaigns/:campaign_id
pub async fn link_campaign(
    State(state): State<Arc<AppState>>,
    Path((id, campaign_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Segment>> {
    let segment = state
        .db
        .run(move |conn| SegmentService::link_campaign(conn, id, campaign_id))
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "Segment {} or campaign {} not found",
                id, campaign_id
            ))
        })?;

    Ok(Json(segment))
}

/// DELETE /api/segments/:id/campaigns/:campaign_id
pub async fn unlink_campaign(
    State(state): State<Arc<AppState>>,
    Path((id, campaign_id)): Path<(i64, i64)>,
) -> ApiResult<Json<MessageResponse>> {
    let removed = state
        .db
        .run(move |conn| SegmentService::unlink_campaign(conn, id, campaign_id))
        .await?;

    if !removed {
        return Err(ApiError::NotFound(format!(
            "Campaign {} is not linked to segment {}",
            campaign_id, id
        )));
    }
    Ok(Json(MessageResponse::new("Campaign unlinked successfully")))
}
