//! Device discovery and snapshot endpoints.
//!
//! - `POST /api/scan`                 -- run discovery, merge, broadcast
//! - `GET  /api/devices`              -- current device snapshot
//! - `GET  /api/devices/{id}/metrics` -- single-entity probe metrics

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;
use lanscape_core::{Device, NetworkMetrics};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan", post(scan))
        .route("/devices", get(list_devices))
        .route("/devices/{id}/metrics", get(device_metrics))
}

/// POST /api/scan - Run discovery and merge the results into the registry.
///
/// Returns the devices produced by this scan (post-merge), while the
/// broadcast carries the full collection.
async fn scan(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Device>>> {
    let scanned = state.probe.scan().await?;
    info!(count = scanned.len(), "scan complete");

    let merged: Vec<Device> = state.with_registry(|reg| {
        scanned
            .into_iter()
            .map(|candidate| reg.upsert_device(candidate))
            .collect()
    });

    state.publish_devices();
    Ok(Json(merged))
}

/// GET /api/devices - Current device snapshot.
async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<Device>> {
    Json(state.with_registry(|reg| reg.devices()))
}

/// GET /api/devices/{id}/metrics - Probe metrics for one entity.
///
/// Best-effort by design: a failed probe reports null fields, not an error.
async fn device_metrics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<NetworkMetrics> {
    let metrics = state.cache.bandwidth(state.probe.as_ref(), &id).await;
    Json(metrics)
}
