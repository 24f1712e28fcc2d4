pub mod admin;
pub mod auth;
pub mod cron;
pub mod health;
pub mod listings;
pub mod users;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/cron/saved-search-digest",
            get(cron::saved_search_digest),
        )
        .route("/api/listings", get(listings::search_listings))
        .route("/api/listings/:key", get(listings::get_listing))
        .route("/api/listings/:key/media", get(listings::get_listing_media))
        .route("/api/buildings/:address", get(listings::get_building))
        .route("/api/users/:user_id", put(users::upsert_user))
        .route(
            "/api/users/:user_id/saved-searches",
            get(users::list_saved_searches)
                .post(users::subscribe)
                .delete(users::unsubscribe),
        )
        .route("/api/users/:user_id/favorites", get(users::list_favorites))
        .route(
            "/api/users/:user_id/favorites/toggle",
            post(users::toggle_favorite),
        )
        .route(
            "/api/users/:user_id/favorites/:listing_key",
            put(users::update_favorite_note),
        )
        .route(
            "/api/admin/agents",
            get(admin::list_agents).post(admin::create_agent),
        )
        .route(
            "/api/admin/agents/:id/buildings",
            get(admin::agent_buildings)
                .post(admin::assign_building)
                .delete(admin::unassign_building),
        )
        .route(
            "/api/admin/buildings",
            get(admin::list_buildings).put(admin::upsert_building),
        )
        .route("/api/admin/digest-runs", get(admin::digest_runs))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
