// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::broadcast::StateEvent;
use crate::cache::ProbeCache;
use crate::probe::NetworkProbe;
use crate::session::SessionTracker;
use lanscape_core::Registry;

/// Shared application state accessible from all route and socket handlers.
///
/// The registry sits behind a `std::sync::Mutex` (not `tokio::sync::Mutex`)
/// because:
/// - every mutation is pure in-memory work that runs to completion
/// - the lock is never held across an `.await` point
/// - admission + insertion happen under one acquisition, which is what
///   keeps two racing connect requests from both passing the duplicate
///   check
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// The entity registry: devices, users, connections.
    pub registry: Mutex<Registry>,
    /// External measurement collaborator.
    pub probe: Arc<dyn NetworkProbe>,
    /// Shared TTL cache in front of bandwidth probes.
    pub cache: ProbeCache,
    /// Push-channel session to user mapping.
    pub sessions: SessionTracker,
    /// Broadcast sender fanning registry snapshots out to every session.
    pub events: broadcast::Sender<StateEvent>,
}

impl AppState {
    /// Create application state wrapped in an Arc for sharing.
    pub fn new(probe: Arc<dyn NetworkProbe>, cache_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            registry: Mutex::new(Registry::new()),
            probe,
            cache: ProbeCache::new(cache_ttl),
            sessions: SessionTracker::new(),
            events: broadcast::channel(256).0,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Run one closure against the registry under its lock.
    ///
    /// All handler access funnels through here so no caller can hold the
    /// guard across an await.
    pub fn with_registry<T>(&self, f: impl FnOnce(&mut Registry) -> T) -> T {
        let mut registry = self.registry.lock().expect("registry lock poisoned");
        f(&mut registry)
    }
}
