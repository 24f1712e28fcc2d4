use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::require_bearer;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Favorite, Frequency, SavedSearch, User};
use crate::services::address::building_key;
use crate::state::AppState;

fn ensure_user(state: &AppState, user_id: &str) -> Result<(), AppError> {
    let db = state.conn();
    match queries::get_user(&db, user_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("user {user_id}"))),
    }
}

// PUT /api/users/:user_id
#[derive(Deserialize)]
pub struct UpsertUserRequest {
    pub email: String,
    pub name: Option<String>,
}

pub async fn upsert_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(req): Json<UpsertUserRequest>,
) -> Result<Json<User>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;

    let email = req.email.trim();
    if !email.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".to_string()));
    }

    let user = User {
        id: user_id,
        email: email.to_string(),
        name: req.name.filter(|n| !n.trim().is_empty()),
    };
    queries::upsert_user(&state.conn(), &user)?;

    Ok(Json(user))
}

// GET /api/users/:user_id/saved-searches
pub async fn list_saved_searches(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SavedSearch>>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;

    let searches = queries::list_saved_searches(&state.conn(), &user_id)?;
    Ok(Json(searches))
}

// POST /api/users/:user_id/saved-searches
#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub address: serde_json::Value,
    pub frequency: Option<Frequency>,
    pub email_enabled: Option<bool>,
}

pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SavedSearch>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;
    ensure_user(&state, &user_id)?;

    // Structured addresses are stored as their JSON text.
    let address = match req.address {
        serde_json::Value::String(s) => s,
        v @ serde_json::Value::Object(_) => v.to_string(),
        _ => String::new(),
    };
    if building_key(&address).is_none() {
        return Err(AppError::BadRequest("address needs a street line".to_string()));
    }

    let search = queries::subscribe(
        &state.conn(),
        &user_id,
        &address,
        req.frequency.unwrap_or_default(),
        req.email_enabled.unwrap_or(true),
    )?;

    tracing::info!(user_id = %user_id, address = %search.address, "saved search subscribed");
    Ok(Json(search))
}

// DELETE /api/users/:user_id/saved-searches?address=...
#[derive(Deserialize)]
pub struct UnsubscribeQuery {
    pub address: String,
}

#[derive(Serialize)]
pub struct UnsubscribeResponse {
    removed: bool,
}

pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;

    let removed = queries::unsubscribe(&state.conn(), &user_id, &query.address)?;
    if removed {
        tracing::info!(user_id = %user_id, address = %query.address, "saved search removed");
    }
    Ok(Json(UnsubscribeResponse { removed }))
}

// GET /api/users/:user_id/favorites
pub async fn list_favorites(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Favorite>>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;

    let favorites = queries::list_favorites(&state.conn(), &user_id)?;
    Ok(Json(favorites))
}

// POST /api/users/:user_id/favorites/toggle
#[derive(Deserialize)]
pub struct ToggleFavoriteRequest {
    pub listing_key: String,
    pub address: Option<String>,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct ToggleFavoriteResponse {
    listing_key: String,
    favorited: bool,
}

pub async fn toggle_favorite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(req): Json<ToggleFavoriteRequest>,
) -> Result<Json<ToggleFavoriteResponse>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;
    ensure_user(&state, &user_id)?;

    let listing_key = req.listing_key.trim().to_string();
    if listing_key.is_empty() {
        return Err(AppError::BadRequest("listing_key is required".to_string()));
    }

    let favorited = queries::toggle_favorite(
        &state.conn(),
        &user_id,
        &listing_key,
        req.address.as_deref(),
        req.note.as_deref(),
    )?;

    Ok(Json(ToggleFavoriteResponse {
        listing_key,
        favorited,
    }))
}

// PUT /api/users/:user_id/favorites/:listing_key
#[derive(Deserialize)]
pub struct FavoriteNoteRequest {
    pub note: Option<String>,
}

pub async fn update_favorite_note(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((user_id, listing_key)): Path<(String, String)>,
    Json(req): Json<FavoriteNoteRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_bearer(&headers, &state.config.api_token)?;

    let note = req.note.as_deref().map(str::trim).filter(|n| !n.is_empty());
    let updated = queries::update_favorite_note(&state.conn(), &user_id, &listing_key, note)?;
    if !updated {
        return Err(AppError::NotFound(format!("favorite {listing_key}")));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
