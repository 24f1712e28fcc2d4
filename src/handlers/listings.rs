use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Agent, Building, ListingSummary, Media};
use crate::services::address::parse_street_address;
use crate::services::listings::{self, ListingPage};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 25;

// GET /api/listings?address=...  or  ?status=...
#[derive(Deserialize)]
pub struct ListingsQuery {
    pub address: Option<String>,
    pub status: Option<String>,
    pub top: Option<u32>,
    pub skip: Option<u32>,
}

pub async fn search_listings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<ListingPage>, AppError> {
    let top = query.top.unwrap_or(DEFAULT_PAGE_SIZE);

    if let Some(raw) = query.address.as_deref().filter(|a| !a.trim().is_empty()) {
        let address = parse_street_address(raw).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let top = top.clamp(1, listings::MAX_PAGE_SIZE);
        let found = listings::by_address(&state.mls, &address, top).await?;
        return Ok(Json(ListingPage {
            listings: found.iter().map(|l| l.summary()).collect(),
            total: None,
            top,
            skip: 0,
        }));
    }

    if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let page = listings::by_status(&state.mls, status.trim(), top, query.skip.unwrap_or(0)).await?;
        return Ok(Json(page));
    }

    Err(AppError::BadRequest("address or status is required".to_string()))
}

// GET /api/listings/:key
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ListingSummary>, AppError> {
    match listings::by_key(&state.mls, &key).await? {
        Some(listing) => Ok(Json(listing.summary())),
        None => Err(AppError::NotFound(format!("listing {key}"))),
    }
}

// GET /api/listings/:key/media
pub async fn get_listing_media(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Vec<Media>>, AppError> {
    let media = listings::media_for(&state.mls, &key).await?;
    Ok(Json(media))
}

// GET /api/buildings/:address
#[derive(Serialize)]
pub struct BuildingResponse {
    building: Building,
    agents: Vec<Agent>,
}

pub async fn get_building(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<BuildingResponse>, AppError> {
    let db = state.conn();
    let building = queries::get_building(&db, &address)?
        .ok_or_else(|| AppError::NotFound(format!("building {address}")))?;
    let agents = queries::agents_for_building(&db, &building.address)?;

    Ok(Json(BuildingResponse { building, agents }))
}
