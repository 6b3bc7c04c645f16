//! Consumer-facing clip endpoints (/clips/*)
//!
//! These only ever serve verified clips; the VALID-only filter lives in the
//! domain query and cannot be overridden by a caller.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::AppState;
use crate::constants::{DEFAULT_CLIP_LIMIT, DEFAULT_PER_CATEGORY_LIMIT, MAX_CLIP_LIMIT};
use crate::models::ClipForDisplay;
use crate::services::clips::{self as clips_service, CategoryClips};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/clips", get(list_clips))
        .route("/clips/by-category", get(list_clips_by_category))
}

#[derive(Deserialize)]
struct ListClipsQuery {
    career: Option<String>,
    category: Option<String>,
    limit: Option<i64>,
}

/// GET /clips - List verified clips, optionally filtered by career/category
async fn list_clips(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListClipsQuery>,
) -> Result<Json<Vec<ClipForDisplay>>, StatusCode> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_CLIP_LIMIT)
        .clamp(1, MAX_CLIP_LIMIT);

    let clips = clips_service::list_valid_clips(
        &state.db,
        &state.validator,
        query.career.as_deref(),
        query.category.as_deref(),
        limit,
    )
    .await
    .log_500("List clips error")?;

    Ok(Json(clips))
}

#[derive(Deserialize)]
struct ByCategoryQuery {
    limit: Option<i64>,
}

/// GET /clips/by-category - Verified clips grouped by category
async fn list_clips_by_category(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ByCategoryQuery>,
) -> Result<Json<Vec<CategoryClips>>, StatusCode> {
    let per_category_limit = query
        .limit
        .unwrap_or(DEFAULT_PER_CATEGORY_LIMIT)
        .clamp(1, MAX_CLIP_LIMIT);

    let groups =
        clips_service::list_clips_by_category(&state.db, &state.validator, per_category_limit)
            .await
            .log_500("List clips by category error")?;

    Ok(Json(groups))
}
