use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth::require_bearer;
use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Agent, AgentBuilding, Building, DigestRun, NewAgent};
use crate::state::AppState;

// GET /api/admin/agents
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Agent>>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    let agents = queries::list_agents(&state.conn())?;
    Ok(Json(agents))
}

// POST /api/admin/agents
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewAgent>,
) -> Result<Json<Agent>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    if req.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    if !req.email.contains('@') {
        return Err(AppError::BadRequest("a valid email is required".to_string()));
    }

    let agent = queries::create_agent(&state.conn(), &req)?;
    tracing::info!(agent_id = %agent.id, name = %agent.name, "agent created");
    Ok(Json(agent))
}

fn ensure_agent(state: &AppState, agent_id: &str) -> Result<(), AppError> {
    match queries::get_agent(&state.conn(), agent_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("agent {agent_id}"))),
    }
}

// GET /api/admin/agents/:id/buildings
pub async fn agent_buildings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(agent_id): Path<String>,
) -> Result<Json<Vec<AgentBuilding>>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    ensure_agent(&state, &agent_id)?;

    let assignments = queries::buildings_for_agent(&state.conn(), &agent_id)?;
    Ok(Json(assignments))
}

// POST /api/admin/agents/:id/buildings
#[derive(Deserialize)]
pub struct AssignmentRequest {
    pub address: String,
}

#[derive(Serialize)]
pub struct AssignmentResponse {
    changed: bool,
}

pub async fn assign_building(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(agent_id): Path<String>,
    Json(req): Json<AssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;
    ensure_agent(&state, &agent_id)?;

    if req.address.trim().is_empty() {
        return Err(AppError::BadRequest("address is required".to_string()));
    }

    let changed = queries::assign_building(&state.conn(), &agent_id, &req.address)?;
    if changed {
        tracing::info!(agent_id = %agent_id, address = %req.address, "building assigned");
    }
    Ok(Json(AssignmentResponse { changed }))
}

// DELETE /api/admin/agents/:id/buildings?address=...
pub async fn unassign_building(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(agent_id): Path<String>,
    Query(req): Query<AssignmentRequest>,
) -> Result<Json<AssignmentResponse>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    let changed = queries::unassign_building(&state.conn(), &agent_id, &req.address)?;
    Ok(Json(AssignmentResponse { changed }))
}

// GET /api/admin/buildings
pub async fn list_buildings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Building>>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    let buildings = queries::list_buildings(&state.conn())?;
    Ok(Json(buildings))
}

// PUT /api/admin/buildings
pub async fn upsert_building(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(building): Json<Building>,
) -> Result<Json<Building>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    if building.address.trim().is_empty() {
        return Err(AppError::BadRequest("address is required".to_string()));
    }

    let db = state.conn();
    queries::upsert_building(&db, &building)?;
    let stored = queries::get_building(&db, &building.address)?
        .ok_or_else(|| AppError::NotFound(format!("building {}", building.address)))?;
    Ok(Json(stored))
}

// GET /api/admin/digest-runs
#[derive(Deserialize)]
pub struct DigestRunsQuery {
    pub limit: Option<i64>,
}

pub async fn digest_runs(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<DigestRunsQuery>,
) -> Result<Json<Vec<DigestRun>>, AppError> {
    require_bearer(&headers, &state.config.admin_token)?;

    let limit = query.limit.unwrap_or(20).clamp(1, 200);
    let runs = queries::recent_digest_runs(&state.conn(), limit)?;
    Ok(Json(runs))
}
