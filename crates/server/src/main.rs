// crates/server/src/main.rs
//! Lanscape server binary.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lanscape_server::probe::{OsProbe, DEFAULT_PROBE_TIMEOUT};
use lanscape_server::{create_app, AppState};

/// Default port for the server.
const DEFAULT_PORT: u16 = 3002;

/// Get the server port from environment or use default.
fn get_port() -> u16 {
    std::env::var("LANSCAPE_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

/// Get the bind address from environment or use default (all interfaces).
fn get_bind_addr() -> IpAddr {
    std::env::var("LANSCAPE_BIND")
        .ok()
        .and_then(|a| a.parse().ok())
        .unwrap_or_else(|| IpAddr::from([0, 0, 0, 0]))
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,lanscape_server=info,lanscape_core=info".into()),
        )
        .init();

    let probe_timeout = duration_from_env("LANSCAPE_PROBE_TIMEOUT_SECS", DEFAULT_PROBE_TIMEOUT);
    let cache_ttl = duration_from_env(
        "LANSCAPE_PROBE_CACHE_TTL_SECS",
        lanscape_server::cache::DEFAULT_CACHE_TTL,
    );

    let probe = Arc::new(OsProbe::new(probe_timeout));
    let state = AppState::new(probe, cache_ttl);
    let app = create_app(state);

    let addr = SocketAddr::from((get_bind_addr(), get_port()));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("lanscape server listening on {addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
