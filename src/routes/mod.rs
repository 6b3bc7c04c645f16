pub mod admin;
pub mod clips;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(clips::routes())
        .merge(admin::routes())
}
