//! Connection admission, removal, and quality-test endpoints.
//!
//! - `POST   /api/connect`                -- admission engine request
//! - `DELETE /api/connections/{id}`       -- remove a connection
//! - `POST   /api/connections/{id}/test`  -- run a quality test

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use lanscape_core::{Connection, ConnectionTest, ConnectionType, NetworkMetrics};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/connect", post(connect))
        .route("/connections/{id}", delete(remove_connection))
        .route("/connections/{id}/test", post(test_connection))
}

/// Body of POST /api/connect. `userId` is the target of the proposed
/// connection and `sourceId` the initiating entity.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectRequest {
    user_id: String,
    source_id: String,
    connection_type: ConnectionType,
}

#[derive(Debug, Serialize)]
struct RemoveResponse {
    success: bool,
}

/// POST /api/connect - Ask the admission engine for a new connection.
///
/// 200 with the connection on approval, 400 with the denial reason, 404
/// when either referenced entity is unknown.
async fn connect(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<Json<Connection>> {
    // Admission and insertion run under one registry acquisition, so two
    // racing requests for the same pair serialize and the loser is denied.
    let connection = state.with_registry(|reg| {
        reg.connect(&req.source_id, &req.user_id, req.connection_type)
    })?;

    info!(
        connection_id = %connection.id,
        source = %connection.source_id,
        target = %connection.target_id,
        kind = connection.connection_type.as_str(),
        "connection established"
    );
    state.publish_connections();
    Ok(Json(connection))
}

/// DELETE /api/connections/{id} - Remove a connection.
async fn remove_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RemoveResponse>> {
    let removed = state.with_registry(|reg| reg.remove_connection(&id));
    if !removed {
        return Err(ApiError::ConnectionNotFound(id));
    }
    state.publish_connections();
    Ok(Json(RemoveResponse { success: true }))
}

/// POST /api/connections/{id}/test - Connection quality test.
///
/// Probes both endpoints independently, averages the two sides (missing
/// fields count as zero only in that averaging step), stores the result on
/// the connection, and rebroadcasts the collection.
async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectionTest>> {
    let connection = state
        .with_registry(|reg| reg.connection(&id))
        .ok_or_else(|| ApiError::ConnectionNotFound(id.clone()))?;

    let (source_metrics, target_metrics) = tokio::join!(
        state.cache.bandwidth(state.probe.as_ref(), &connection.source_id),
        state.cache.bandwidth(state.probe.as_ref(), &connection.target_id),
    );

    let test = ConnectionTest {
        metrics: NetworkMetrics::average(&source_metrics, &target_metrics),
        timestamp: Utc::now(),
    };

    // The connection may have been removed while the probes ran.
    state
        .with_registry(|reg| reg.record_test(&id, test.clone()))
        .ok_or(ApiError::ConnectionNotFound(id))?;

    state.publish_connections();
    Ok(Json(test))
}
