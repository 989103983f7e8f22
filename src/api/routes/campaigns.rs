//! Campaign Routes
//!
//! - GET /api/campaigns - List campaigns (skip, limit, search, status)
//! - POST /api/campaigns - Create a campaign
//! - GET /api/campaigns/:id - Get a campaign

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::dto::ListParams;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::model::{Campaign, CampaignCreate, Page};
use crate::service::CampaignService;

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Page<Campaign>>> {
    let pagination = params.pagination()?;
    let filter = params.campaign_filter();

    let page = state
        .db
        .run(move |conn| CampaignService::list(conn, pagination, &filter))
        .await?;

    Ok(Json(page))
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state
        .db
        .run(move |conn| CampaignService::get(conn, id))
        .await?
        .ok_or_else(|| ApiError::not_found("Campaign", id))?;

    Ok(Json(campaign))
}

/// POST /api/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CampaignCreate>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state
        .db
        .run(move |conn| CampaignService::create(conn, req))
        .await?;

    Ok((StatusCode::CREATED, Json(campaign)))
}
