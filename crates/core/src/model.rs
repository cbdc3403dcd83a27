// crates/core/src/model.rs
//! Wire-level domain types shared by the registry and the server.
//!
//! All structs serialize as camelCase JSON so the collections broadcast to
//! browser clients match the shapes the graph UI consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel a discovery source reports when an address could not be read.
pub const UNKNOWN: &str = "unknown";

/// Coarse device classification rendered as a node shape in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Computer,
    Router,
    Smartphone,
    Iot,
    Gaming,
    Other,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Computer => "computer",
            Self::Router => "router",
            Self::Smartphone => "smartphone",
            Self::Iot => "iot",
            Self::Gaming => "gaming",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "computer" => Some(Self::Computer),
            "router" => Some(Self::Router),
            "smartphone" => Some(Self::Smartphone),
            "iot" => Some(Self::Iot),
            "gaming" => Some(Self::Gaming),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Presence of a device or user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    Online,
    Offline,
}

/// A discovered or session-registered network device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub mac: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub is_ethernet: bool,
    pub status: EntityStatus,
    pub is_website_user: bool,
}

impl Device {
    /// Whether the ip field carries a real address (present, not the sentinel).
    pub fn has_ip(&self) -> bool {
        !self.ip.is_empty() && self.ip != UNKNOWN
    }

    /// Whether the mac field carries a real address.
    pub fn has_mac(&self) -> bool {
        !self.mac.is_empty() && self.mac != UNKNOWN
    }

    /// The /24-equivalent prefix: the first three dot-separated components.
    pub fn subnet_prefix(&self) -> Option<String> {
        if !self.has_ip() {
            return None;
        }
        let octets: Vec<&str> = self.ip.split('.').collect();
        if octets.len() == 4 {
            Some(octets[..3].join("."))
        } else {
            None
        }
    }
}

/// A browser-tab identity tracked over the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub status: EntityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_metrics: Option<NetworkMetrics>,
}

/// The three connection flavors the admission engine rules over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectionType {
    P2p,
    Lan,
    Wan,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P2p => "P2P",
            Self::Lan => "LAN",
            Self::Wan => "WAN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "P2P" => Some(Self::P2p),
            "LAN" => Some(Self::Lan),
            "WAN" => Some(Self::Wan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
}

/// Best-effort network quality numbers. `None` means the probe failed or the
/// tool was unavailable; it is never collapsed to zero except inside
/// [`NetworkMetrics::average`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub upload_speed: Option<f64>,
    pub download_speed: Option<f64>,
    pub latency: Option<f64>,
    pub packet_loss: Option<f64>,
    pub throughput: Option<f64>,
}

impl NetworkMetrics {
    /// All fields unavailable.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Combine the two sides of a connection into one quality figure.
    ///
    /// Missing fields count as zero here (and only here), so a fully failed
    /// probe on one side drags the combined number toward zero instead of
    /// propagating `None`.
    pub fn average(source: &Self, target: &Self) -> Self {
        fn avg(a: Option<f64>, b: Option<f64>) -> Option<f64> {
            Some((a.unwrap_or(0.0) + b.unwrap_or(0.0)) / 2.0)
        }
        Self {
            upload_speed: avg(source.upload_speed, target.upload_speed),
            download_speed: avg(source.download_speed, target.download_speed),
            latency: avg(source.latency, target.latency),
            packet_loss: avg(source.packet_loss, target.packet_loss),
            throughput: avg(source.throughput, target.throughput),
        }
    }
}

/// A completed quality test attached to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTest {
    #[serde(flatten)]
    pub metrics: NetworkMetrics,
    pub timestamp: DateTime<Utc>,
}

/// An admitted link between two entities. Undirected: source/target order
/// never changes semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub connection_type: ConnectionType,
    pub status: ConnectionStatus,
    pub established: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_test: Option<ConnectionTest>,
}

impl Connection {
    /// Whether this connection has `id` as either endpoint.
    pub fn involves(&self, id: &str) -> bool {
        self.source_id == id || self.target_id == id
    }

    /// Whether this connection links the unordered pair `(a, b)`.
    pub fn links(&self, a: &str, b: &str) -> bool {
        (self.source_id == a && self.target_id == b)
            || (self.source_id == b && self.target_id == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_subnet_prefix() {
        let mut d = Device {
            id: "d1".into(),
            name: "host".into(),
            ip: "192.168.1.10".into(),
            mac: UNKNOWN.into(),
            device_type: DeviceType::Computer,
            is_ethernet: false,
            status: EntityStatus::Online,
            is_website_user: false,
        };
        assert_eq!(d.subnet_prefix().as_deref(), Some("192.168.1"));

        d.ip = UNKNOWN.into();
        assert_eq!(d.subnet_prefix(), None);

        d.ip = "not-an-ip".into();
        assert_eq!(d.subnet_prefix(), None);
    }

    #[test]
    fn test_average_treats_none_as_zero() {
        let source = NetworkMetrics {
            download_speed: Some(100.0),
            upload_speed: Some(10.0),
            latency: Some(20.0),
            packet_loss: None,
            throughput: Some(100.0),
        };
        let target = NetworkMetrics {
            download_speed: None,
            upload_speed: Some(30.0),
            latency: Some(40.0),
            packet_loss: Some(5.0),
            throughput: None,
        };
        let combined = NetworkMetrics::average(&source, &target);
        assert_eq!(combined.download_speed, Some(50.0));
        assert_eq!(combined.upload_speed, Some(20.0));
        assert_eq!(combined.latency, Some(30.0));
        assert_eq!(combined.packet_loss, Some(2.5));
        assert_eq!(combined.throughput, Some(50.0));
    }

    #[test]
    fn test_connection_links_is_unordered() {
        let conn = Connection {
            id: "conn-1".into(),
            source_id: "a".into(),
            target_id: "b".into(),
            connection_type: ConnectionType::Lan,
            status: ConnectionStatus::Active,
            established: Utc::now(),
            last_test: None,
        };
        assert!(conn.links("a", "b"));
        assert!(conn.links("b", "a"));
        assert!(!conn.links("a", "c"));
        assert!(conn.involves("a"));
        assert!(!conn.involves("c"));
    }

    #[test]
    fn test_device_json_shape() {
        let d = Device {
            id: "device-1".into(),
            name: "macbook".into(),
            ip: "192.168.1.7".into(),
            mac: "a4:83:e7:68:e2:30".into(),
            device_type: DeviceType::Computer,
            is_ethernet: true,
            status: EntityStatus::Online,
            is_website_user: false,
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["type"], "computer");
        assert_eq!(json["isEthernet"], true);
        assert_eq!(json["isWebsiteUser"], false);
        assert_eq!(json["status"], "online");
    }

    #[test]
    fn test_connection_type_round_trip() {
        for s in ["P2P", "LAN", "WAN"] {
            let parsed = ConnectionType::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
            let json = serde_json::to_string(&parsed).unwrap();
            assert_eq!(json, format!("\"{s}\""));
        }
        assert_eq!(ConnectionType::parse("p2p"), None);
    }

    #[test]
    fn test_metrics_null_fields_survive_serialization() {
        let m = NetworkMetrics {
            download_speed: Some(42.5),
            ..NetworkMetrics::unavailable()
        };
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["downloadSpeed"], 42.5);
        assert!(json["uploadSpeed"].is_null());
        assert!(json["packetLoss"].is_null());
    }
}
