//! Operational validation endpoints (/admin/clips/*)
//!
//! Consumed by seed tooling and ad hoc re-validation, not by the UI.
//! Gated by a static bearer token.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;
use crate::domain::clips as clips_domain;
use crate::models::VerifiedStatus;
use crate::services::clips::{self as clips_service, BatchReport, ValidationReport};
use crate::services::error::LogErr;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/clips/{id}/validate", post(validate_clip))
        .route("/admin/clips/validate-all", post(validate_all))
        .route("/admin/clips/status", get(status_summary))
}

/// Require the admin bearer token from the Authorization header
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token != state.admin_token {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

/// POST /admin/clips/:id/validate - Validate one clip and persist the outcome
async fn validate_clip(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(clip_id): Path<i64>,
) -> Result<Json<ValidationReport>, StatusCode> {
    require_admin(&state, &headers)?;

    let report = clips_service::validate_and_update(&state.db, &state.validator, clip_id)
        .await
        .log_500("Validate clip error")?;

    Ok(Json(report))
}

#[derive(Serialize)]
struct StatusSummary {
    not_checked: i64,
    valid: i64,
    invalid: i64,
}

/// GET /admin/clips/status - Verification state counts across all clips
async fn status_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusSummary>, StatusCode> {
    require_admin(&state, &headers)?;

    let not_checked = clips_domain::count_by_status(&state.db, VerifiedStatus::NotChecked)
        .await
        .log_500("Count not-checked clips error")?;
    let valid = clips_domain::count_by_status(&state.db, VerifiedStatus::Valid)
        .await
        .log_500("Count valid clips error")?;
    let invalid = clips_domain::count_by_status(&state.db, VerifiedStatus::Invalid)
        .await
        .log_500("Count invalid clips error")?;

    Ok(Json(StatusSummary {
        not_checked,
        valid,
        invalid,
    }))
}

/// POST /admin/clips/validate-all - Validate every not-yet-checked clip
async fn validate_all(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BatchReport>, StatusCode> {
    require_admin(&state, &headers)?;

    let report = clips_service::validate_all_pending(&state.db, &state.validator)
        .await
        .log_500("Validate all pending error")?;

    Ok(Json(report))
}
