// crates/core/src/admission.rs
//! The admission engine: decides whether a proposed connection between two
//! entities is allowed, given the existing connections and what we know
//! about each endpoint's network locality.

use thiserror::Error;

use crate::model::{Connection, ConnectionType, Device, User};

/// A structured admission denial. The `Display` strings are the
/// client-visible reasons returned by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("P2P connections are limited to 2 users only")]
    P2pBusy,

    #[error("LAN connections are only allowed between users on the same network")]
    DifferentNetwork,

    #[error("cannot determine network information")]
    UnknownNetwork,

    #[error("Connection already exists between these users")]
    Duplicate,

    #[error("a WAN connection already exists between these endpoints")]
    DuplicateWan,
}

/// What the locality rule needs to know about one endpoint.
struct NetworkFacts {
    subnet: Option<String>,
    is_ethernet: bool,
}

/// Resolve the device record that anchors an entity's network facts:
/// the device itself, the session's synthetic entry, or a scanned device
/// matching the user's client IP.
fn device_for_entity<'a>(
    entity_id: &str,
    devices: &'a [Device],
    users: &[User],
) -> Option<&'a Device> {
    if let Some(d) = devices.iter().find(|d| d.id == entity_id) {
        return Some(d);
    }
    let session_device = format!("device-user-{entity_id}");
    if let Some(d) = devices.iter().find(|d| d.id == session_device) {
        return Some(d);
    }
    let user = users.iter().find(|u| u.id == entity_id)?;
    let ip = user.client_ip.as_deref()?;
    devices.iter().find(|d| d.has_ip() && d.ip == ip)
}

fn facts_for_entity(entity_id: &str, devices: &[Device], users: &[User]) -> Option<NetworkFacts> {
    device_for_entity(entity_id, devices, users).map(|d| NetworkFacts {
        subnet: d.subnet_prefix(),
        is_ethernet: d.is_ethernet,
    })
}

fn entity_exists(id: &str, devices: &[Device], users: &[User]) -> bool {
    devices.iter().any(|d| d.id == id) || users.iter().any(|u| u.id == id)
}

/// Evaluate the admission rules, in order, for a proposed connection.
///
/// Rules:
/// 1. P2P is strictly 1-to-1 globally per participant.
/// 2. LAN requires locality compatibility: same /24-equivalent prefix, or
///    both endpoints wired. Unresolvable network info denies outright.
/// 3. WAN is denied only when a WAN connection already links this pair.
/// 4. P2P and LAN are denied when any connection already links this pair.
pub fn can_connect(
    source_id: &str,
    target_id: &str,
    kind: ConnectionType,
    devices: &[Device],
    users: &[User],
    connections: &[Connection],
) -> Result<(), AdmissionError> {
    if !entity_exists(source_id, devices, users) {
        return Err(AdmissionError::UnknownEntity(source_id.to_string()));
    }
    if !entity_exists(target_id, devices, users) {
        return Err(AdmissionError::UnknownEntity(target_id.to_string()));
    }

    match kind {
        ConnectionType::P2p => {
            let busy = connections.iter().any(|c| {
                c.connection_type == ConnectionType::P2p
                    && (c.involves(source_id) || c.involves(target_id))
            });
            if busy {
                return Err(AdmissionError::P2pBusy);
            }
        }
        ConnectionType::Lan => {
            let source = facts_for_entity(source_id, devices, users)
                .ok_or(AdmissionError::UnknownNetwork)?;
            let target = facts_for_entity(target_id, devices, users)
                .ok_or(AdmissionError::UnknownNetwork)?;
            let wired = source.is_ethernet && target.is_ethernet;
            if !wired {
                match (&source.subnet, &target.subnet) {
                    (Some(a), Some(b)) if a == b => {}
                    (Some(_), Some(_)) => return Err(AdmissionError::DifferentNetwork),
                    _ => return Err(AdmissionError::UnknownNetwork),
                }
            }
        }
        ConnectionType::Wan => {
            let dup = connections.iter().any(|c| {
                c.connection_type == ConnectionType::Wan && c.links(source_id, target_id)
            });
            if dup {
                return Err(AdmissionError::DuplicateWan);
            }
        }
    }

    if kind != ConnectionType::Wan
        && connections.iter().any(|c| c.links(source_id, target_id))
    {
        return Err(AdmissionError::Duplicate);
    }

    Ok(())
}
