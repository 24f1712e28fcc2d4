use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;

use super::auth::require_bearer;
use crate::errors::AppError;
use crate::models::DigestReport;
use crate::services::digest;
use crate::state::AppState;

// GET /api/cron/saved-search-digest
pub async fn saved_search_digest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<DigestReport>, AppError> {
    if let Err(e) = require_bearer(&headers, &state.config.cron_secret) {
        tracing::warn!("rejected digest trigger with bad secret");
        return Err(e);
    }

    let stats = digest::run_saved_search_digest(&state, Utc::now()).await?;

    Ok(Json(DigestReport {
        success: !stats.has_failures(),
        stats,
    }))
}
