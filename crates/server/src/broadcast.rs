// crates/server/src/broadcast.rs
//! The broadcast gateway: fans full collection snapshots out to every
//! connected push-channel session whenever a collection mutates.
//!
//! Events always carry the complete current collection, never a diff, and
//! the three kinds are published independently. Clients must tolerate
//! transient cross-collection inconsistency (a connection referencing a
//! user whose update has not arrived yet).

use serde::Serialize;

use crate::state::AppState;
use lanscape_core::{Connection, Device, User};

/// One push-channel event. The serialized form is
/// `{"type": "device-update", "payload": [...]}` and friends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum StateEvent {
    DeviceUpdate(Vec<Device>),
    UserUpdate(Vec<User>),
    ConnectionUpdate(Vec<Connection>),
}

impl AppState {
    /// Publish the current device collection to every subscriber.
    pub fn publish_devices(&self) {
        let snapshot = self.with_registry(|reg| reg.devices());
        // Send only fails when nobody is subscribed, which is fine.
        let _ = self.events.send(StateEvent::DeviceUpdate(snapshot));
    }

    /// Publish the current user collection to every subscriber.
    pub fn publish_users(&self) {
        let snapshot = self.with_registry(|reg| reg.users());
        let _ = self.events.send(StateEvent::UserUpdate(snapshot));
    }

    /// Publish the current connection collection to every subscriber.
    pub fn publish_connections(&self) {
        let snapshot = self.with_registry(|reg| reg.connections());
        let _ = self.events.send(StateEvent::ConnectionUpdate(snapshot));
    }

    /// Publish all three collections, one event per kind.
    pub fn publish_all(&self) {
        self.publish_devices();
        self.publish_users();
        self.publish_connections();
    }

    /// The three current snapshots as ready-to-send events, for hydrating
    /// a session the moment it attaches.
    pub fn snapshot_events(&self) -> [StateEvent; 3] {
        self.with_registry(|reg| {
            [
                StateEvent::DeviceUpdate(reg.devices()),
                StateEvent::UserUpdate(reg.users()),
                StateEvent::ConnectionUpdate(reg.connections()),
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{NetworkProbe, ProbeError};
    use async_trait::async_trait;
    use lanscape_core::NetworkMetrics;
    use std::sync::Arc;
    use std::time::Duration;

    struct NullProbe;

    #[async_trait]
    impl NetworkProbe for NullProbe {
        async fn bandwidth(&self, _target: &str) -> NetworkMetrics {
            NetworkMetrics::unavailable()
        }

        async fn scan(&self) -> Result<Vec<Device>, ProbeError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let event = StateEvent::UserUpdate(vec![]);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user-update");
        assert!(json["payload"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let state = AppState::new(Arc::new(NullProbe), Duration::from_secs(300));
        let mut rx = state.events.subscribe();

        state.with_registry(|reg| reg.upsert_user(None, Some("Alice".into()), None));
        state.publish_users();

        match rx.recv().await.unwrap() {
            StateEvent::UserUpdate(users) => {
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].name, "Alice");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_snapshot_events_cover_all_kinds() {
        let state = AppState::new(Arc::new(NullProbe), Duration::from_secs(300));
        let [devices, users, connections] = state.snapshot_events();
        assert!(matches!(devices, StateEvent::DeviceUpdate(_)));
        assert!(matches!(users, StateEvent::UserUpdate(_)));
        assert!(matches!(connections, StateEvent::ConnectionUpdate(_)));
    }
}
