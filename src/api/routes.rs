//! API route definitions

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use super::server::AppState;

/// Create the push listener router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check (no auth required)
        .route("/health", get(handlers::health::health_check))
        // Token-protected
        .route("/profiles", post(handlers::profiles::push_profiles))
        .route("/traffic", get(handlers::traffic::traffic_snapshot))
        .with_state(state)
}
