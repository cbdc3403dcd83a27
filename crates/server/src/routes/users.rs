//! User snapshot endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use futures_util::future::join_all;

use crate::state::AppState;
use lanscape_core::User;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", get(list_users))
}

/// GET /api/users - Current user snapshot, annotated with live metrics.
///
/// Annotation is best-effort: each user's metrics come from the shared
/// probe cache, keyed by client ip when known, and a failed probe leaves
/// null fields rather than failing the request. The snapshot itself is
/// taken once, before any probing.
async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    let users = state.with_registry(|reg| reg.users());

    let annotated = join_all(users.into_iter().map(|mut user| {
        let state = state.clone();
        async move {
            let key = user.client_ip.clone().unwrap_or_else(|| user.id.clone());
            user.network_metrics = Some(state.cache.bandwidth(state.probe.as_ref(), &key).await);
            user
        }
    }))
    .await;

    Json(annotated)
}
