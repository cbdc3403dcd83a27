// crates/server/src/session.rs
//! Session tracking: the transient push-channel session to user-identity
//! mapping that drives online/offline transitions.

use dashmap::DashMap;

/// One-to-one session-to-user mapping. The last session to register for a
/// given identity implicitly becomes canonical.
#[derive(Default)]
pub struct SessionTracker {
    map: DashMap<String, String>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a session to a user identity, replacing any previous binding
    /// for that session.
    pub fn attach(&self, session_id: &str, user_id: &str) {
        self.map.insert(session_id.to_string(), user_id.to_string());
    }

    /// Unbind a session, returning the user it carried.
    pub fn detach(&self, session_id: &str) -> Option<String> {
        self.map.remove(session_id).map(|(_, user_id)| user_id)
    }

    /// Drop all mappings. Called when the registry performs a global reset.
    pub fn clear(&self) {
        self.map.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach_round_trip() {
        let tracker = SessionTracker::new();
        tracker.attach("s1", "u1");
        tracker.attach("s2", "u2");
        assert_eq!(tracker.len(), 2);

        assert_eq!(tracker.detach("s1").as_deref(), Some("u1"));
        assert_eq!(tracker.detach("s1"), None);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_reattach_replaces_binding() {
        let tracker = SessionTracker::new();
        tracker.attach("s1", "u1");
        tracker.attach("s1", "u2");
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.detach("s1").as_deref(), Some("u2"));
    }

    #[test]
    fn test_clear_drops_everything() {
        let tracker = SessionTracker::new();
        tracker.attach("s1", "u1");
        tracker.attach("s2", "u2");
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
