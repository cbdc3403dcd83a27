//! API route handlers for the lanscape server.

pub mod connections;
pub mod devices;
pub mod health;
pub mod users;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/scan - Run device discovery and merge the results
/// - GET  /api/devices - Current device snapshot
/// - GET  /api/devices/{id}/metrics - Single-entity probe metrics
/// - GET  /api/users - Current user snapshot with best-effort metrics
/// - POST /api/connect - Request a connection between two entities
/// - DELETE /api/connections/{id} - Remove a connection
/// - POST /api/connections/{id}/test - Run a connection quality test
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", devices::router())
        .nest("/api", users::router())
        .nest("/api", connections::router())
        .with_state(state)
}
