//! HTTP route handlers.
//!
//! All handlers are thin - they delegate to services for business logic.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::api::ws::ws_handler;
use crate::api::AppState;

/// Creates the Axum router with all routes.
///
/// Permissive CORS (any origin/method/header, no credentials) matches how
/// this codebase's browser-facing HTTP server is set up elsewhere: clients
/// connect from whatever page embeds the player, not from a fixed origin.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    Router::new()
        .route("/health", get(health_check))
        .route("/v/{room}", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

/// Liveness probe: reports process health and the number of currently
/// live rooms and connections.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "rooms": state.playbacks.namespaces().len(),
        "clients": state.clients.size(),
    }))
}
