// crates/core/src/registry.rs
//! The entity registry: the single in-memory model of devices, users and
//! connections, with the identity/merge rules for records arriving from
//! multiple discovery sources.
//!
//! `Registry` is an owned value with a controlled mutation API; the server
//! wraps it in a lock and never reaches into module-level state. Every
//! mutation runs to completion before a snapshot can be taken, so callers
//! always observe a consistent point-in-time view.

use chrono::Utc;
use uuid::Uuid;

use crate::admission::{self, AdmissionError};
use crate::classify::{better_name, is_generic_name};
use crate::model::{
    Connection, ConnectionStatus, ConnectionTest, ConnectionType, Device, DeviceType,
    EntityStatus, User, UNKNOWN,
};

/// Knobs for the identity-merge rules.
///
/// `merge_users_by_name` keeps the source system's behavior of treating a
/// session presenting an existing display name as that same user
/// reconnecting. It collapses distinct people with identical names, so it
/// is a policy switch rather than a hard-coded rule.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    pub merge_users_by_name: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self {
            merge_users_by_name: true,
        }
    }
}

/// Outcome of a session detach.
#[derive(Debug, Clone)]
pub struct SessionRemoval {
    /// The user that went offline, if it was known.
    pub user: Option<User>,
    /// Whether the global-reset condition fired and wiped the registry.
    pub reset: bool,
}

/// In-memory registry of devices, users and connections.
///
/// Collections are insertion-ordered; snapshot accessors return clones so
/// no caller ever sees a collection mid-mutation.
#[derive(Debug, Default)]
pub struct Registry {
    devices: Vec<Device>,
    users: Vec<User>,
    connections: Vec<Connection>,
    policy: MergePolicy,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_policy(MergePolicy::default())
    }

    pub fn with_policy(policy: MergePolicy) -> Self {
        Self {
            devices: Vec::new(),
            users: Vec::new(),
            connections: Vec::new(),
            policy,
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn devices(&self) -> Vec<Device> {
        self.devices.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.users.clone()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.clone()
    }

    pub fn online_user_count(&self) -> usize {
        self.users
            .iter()
            .filter(|u| u.status == EntityStatus::Online)
            .count()
    }

    // ------------------------------------------------------------------
    // Devices
    // ------------------------------------------------------------------

    /// Insert or merge a device candidate.
    ///
    /// Identity: `id` first, then a secondary match on `ip`, then on `mac`
    /// (the "unknown" sentinel never matches). On a match the candidate's
    /// fields override the stored record, except that the merged record
    /// keeps its original (earliest-inserted) id, a generic candidate name
    /// never replaces a specific stored one, and `is_website_user` stays
    /// set once set.
    pub fn upsert_device(&mut self, candidate: Device) -> Device {
        let position = self
            .devices
            .iter()
            .position(|d| d.id == candidate.id)
            .or_else(|| {
                if !candidate.has_ip() {
                    return None;
                }
                self.devices.iter().position(|d| d.ip == candidate.ip)
            })
            .or_else(|| {
                if !candidate.has_mac() {
                    return None;
                }
                self.devices.iter().position(|d| d.mac == candidate.mac)
            });

        match position {
            Some(idx) => {
                let candidate_has_ip = candidate.has_ip();
                let candidate_has_mac = candidate.has_mac();
                let d = &mut self.devices[idx];
                d.name = better_name(&d.name, &candidate.name);
                if candidate_has_ip {
                    d.ip = candidate.ip;
                }
                if candidate_has_mac {
                    d.mac = candidate.mac;
                }
                d.device_type = candidate.device_type;
                d.is_ethernet = candidate.is_ethernet;
                d.status = candidate.status;
                d.is_website_user = d.is_website_user || candidate.is_website_user;
                d.clone()
            }
            None => {
                self.devices.push(candidate.clone());
                candidate
            }
        }
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.devices.iter().find(|d| d.id == id).cloned()
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Register (or re-register) a user identity from a session.
    ///
    /// Identity: `id` first; then, when the merge policy allows it, an
    /// exact `name` match among all known users regardless of status: a
    /// session presenting a known name is that user reconnecting. The
    /// revived record keeps its original id and comes back online.
    pub fn upsert_user(
        &mut self,
        id: Option<String>,
        name: Option<String>,
        client_ip: Option<String>,
    ) -> User {
        let fallback_name = format!("User-{}", self.users.len() + 1);
        let name = match name {
            Some(n) if !n.trim().is_empty() => n,
            _ => fallback_name,
        };

        let merge_by_name = self.policy.merge_users_by_name;
        let existing = self
            .users
            .iter_mut()
            .find(|u| id.as_deref() == Some(u.id.as_str()) || (merge_by_name && u.name == name));
        match existing {
            Some(u) => {
                u.status = EntityStatus::Online;
                u.name = better_name(&u.name, &name);
                if client_ip.is_some() {
                    u.client_ip = client_ip;
                }
                u.clone()
            }
            None => {
                let user = User {
                    id: id.unwrap_or_else(|| format!("user-{}", Uuid::new_v4())),
                    name,
                    status: EntityStatus::Online,
                    client_ip,
                    network_metrics: None,
                };
                self.users.push(user.clone());
                user
            }
        }
    }

    pub fn user(&self, id: &str) -> Option<User> {
        self.users.iter().find(|u| u.id == id).cloned()
    }

    /// Anchor a registered user to a device record.
    ///
    /// Identity resolution: the session's own synthetic entry
    /// (`device-user-<userId>`) if present, else a scanned device whose ip
    /// matches the session's client IP; otherwise a new synthetic entry is
    /// inserted. The matched record is then enriched: marked as a website
    /// user, brought online, and given the user's display name when its own
    /// is generic. Enrichment never changes which record was matched.
    pub fn attach_session_device(&mut self, user: &User) -> Device {
        let session_id = format!("device-user-{}", user.id);
        let position = self
            .devices
            .iter()
            .position(|d| d.id == session_id)
            .or_else(|| {
                let ip = user
                    .client_ip
                    .as_deref()
                    .filter(|ip| !ip.is_empty() && *ip != UNKNOWN)?;
                self.devices.iter().position(|d| d.has_ip() && d.ip == ip)
            });

        let idx = match position {
            Some(idx) => idx,
            None => {
                self.devices.push(Device {
                    id: session_id,
                    name: user.name.clone(),
                    ip: user.client_ip.clone().unwrap_or_else(|| UNKNOWN.into()),
                    mac: UNKNOWN.into(),
                    device_type: DeviceType::Computer,
                    is_ethernet: false,
                    status: EntityStatus::Online,
                    is_website_user: true,
                });
                self.devices.len() - 1
            }
        };

        let device = &mut self.devices[idx];
        device.status = EntityStatus::Online;
        device.is_website_user = true;
        if is_generic_name(&device.name) && !is_generic_name(&user.name) {
            device.name = user.name.clone();
        }
        device.clone()
    }

    /// Detach a user's session: mark the user offline, drop the session's
    /// synthetic device entry, and fire the global reset when no user
    /// remains online.
    pub fn remove_user_session(&mut self, user_id: &str) -> SessionRemoval {
        let mut removed_user = None;
        if let Some(u) = self.users.iter_mut().find(|u| u.id == user_id) {
            u.status = EntityStatus::Offline;
            removed_user = Some(u.clone());
        }
        let session_device = format!("device-user-{user_id}");
        self.devices.retain(|d| d.id != session_device);

        // An empty room means no state worth keeping: with no persistence
        // and no authentication, the registry is wiped wholesale.
        let reset = self.online_user_count() == 0;
        if reset {
            self.devices.clear();
            self.users.clear();
            self.connections.clear();
        }
        SessionRemoval {
            user: removed_user,
            reset,
        }
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Admit and insert a connection in one mutation, so two racing
    /// requests for the same pair cannot both pass the duplicate check.
    pub fn connect(
        &mut self,
        source_id: &str,
        target_id: &str,
        kind: ConnectionType,
    ) -> Result<Connection, AdmissionError> {
        admission::can_connect(
            source_id,
            target_id,
            kind,
            &self.devices,
            &self.users,
            &self.connections,
        )?;
        let connection = Connection {
            id: format!("conn-{}", Uuid::new_v4()),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            connection_type: kind,
            status: ConnectionStatus::Active,
            established: Utc::now(),
            last_test: None,
        };
        self.connections.push(connection.clone());
        Ok(connection)
    }

    pub fn connection(&self, id: &str) -> Option<Connection> {
        self.connections.iter().find(|c| c.id == id).cloned()
    }

    pub fn remove_connection(&mut self, id: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != id);
        self.connections.len() != before
    }

    /// Attach a completed quality test to a connection.
    pub fn record_test(&mut self, id: &str, test: ConnectionTest) -> Option<Connection> {
        let conn = self.connections.iter_mut().find(|c| c.id == id)?;
        conn.last_test = Some(test);
        Some(conn.clone())
    }
}
