// crates/server/src/lib.rs
//! Lanscape server library.
//!
//! This crate provides the Axum-based HTTP + WebSocket server for the
//! lanscape LAN-discovery demo: device discovery endpoints, the connection
//! admission API, and the push channel that streams registry snapshots to
//! every connected browser session.

pub mod broadcast;
pub mod cache;
pub mod error;
pub mod probe;
pub mod routes;
pub mod session;
pub mod state;
pub mod ws;

pub use error::*;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, scan, devices, users, connections)
/// - The /ws push channel
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state.clone()))
        .route("/ws", get(ws::ws_handler).with_state(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
