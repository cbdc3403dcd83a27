// crates/server/src/probe.rs
//! The network probe adapter: shells out to OS utilities (`arp -a`,
//! `ping`, `speedtest-cli`) and turns their textual output into best-effort
//! metrics and device candidates.
//!
//! Probe failures are isolated per call: a missing tool or a timeout yields
//! unavailable (`None`) metric fields, never a hard failure of the
//! enclosing request. Scan failures are the one exception, since
//! `/api/scan` has nothing to return without arp output.

use std::time::Duration;

use async_trait::async_trait;
use regex_lite::Regex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use lanscape_core::{classify_device, friendly_name, Device, DeviceType, EntityStatus, NetworkMetrics};

/// Default bound on any single external tool invocation.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the probe subsystem.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("{tool} exited with status {status}")]
    Failed { tool: &'static str, status: std::process::ExitStatus },
}

/// The measurement collaborator the registry core is specified against.
///
/// Implementations must be safe to call concurrently; each call stands
/// alone and no retry is attempted here.
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    /// Estimate upload/download speed, latency and packet loss for a
    /// target entity. Fields fail independently.
    async fn bandwidth(&self, target: &str) -> NetworkMetrics;

    /// Enumerate devices on the local segment.
    async fn scan(&self) -> Result<Vec<Device>, ProbeError>;
}

/// Probe implementation backed by the host OS tools.
pub struct OsProbe {
    timeout: Duration,
}

impl OsProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Run one external tool to completion, bounded by the probe timeout.
    async fn run_tool(&self, tool: &'static str, args: &[&str]) -> Result<String, ProbeError> {
        let fut = Command::new(tool).args(args).output();
        let output = tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ProbeError::Timeout {
                tool,
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|source| ProbeError::Spawn { tool, source })?;
        if !output.status.success() {
            return Err(ProbeError::Failed {
                tool,
                status: output.status,
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for OsProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl NetworkProbe for OsProbe {
    async fn bandwidth(&self, target: &str) -> NetworkMetrics {
        let mut metrics = NetworkMetrics::unavailable();

        match self.run_tool("speedtest-cli", &["--simple"]).await {
            Ok(out) => {
                let (latency, download, upload) = parse_speedtest(&out);
                metrics.latency = latency;
                metrics.download_speed = download;
                metrics.upload_speed = upload;
                metrics.throughput = download;
            }
            Err(e) => warn!(target, error = %e, "speedtest probe unavailable"),
        }

        match self.run_tool("ping", &["-c", "10", "google.com"]).await {
            Ok(out) => metrics.packet_loss = parse_ping_loss(&out),
            Err(e) => warn!(target, error = %e, "ping probe unavailable"),
        }

        debug!(target, ?metrics, "bandwidth probe complete");
        metrics
    }

    async fn scan(&self) -> Result<Vec<Device>, ProbeError> {
        let out = self.run_tool("arp", &["-a"]).await?;
        Ok(parse_arp(&out))
    }
}

/// Parse `speedtest-cli --simple` output:
///
/// ```text
/// Ping: 12.345 ms
/// Download: 123.45 Mbit/s
/// Upload: 67.89 Mbit/s
/// ```
pub fn parse_speedtest(out: &str) -> (Option<f64>, Option<f64>, Option<f64>) {
    let grab = |pattern: &str| {
        Regex::new(pattern)
            .unwrap()
            .captures(out)
            .and_then(|c| c[1].parse::<f64>().ok())
    };
    let latency = grab(r"Ping:\s*([\d.]+)\s*ms");
    let download = grab(r"Download:\s*([\d.]+)\s*Mbit/s");
    let upload = grab(r"Upload:\s*([\d.]+)\s*Mbit/s");
    (latency, download, upload)
}

/// Pull the loss percentage out of `ping` summary output
/// (`10 packets transmitted, 10 received, 0% packet loss`).
pub fn parse_ping_loss(out: &str) -> Option<f64> {
    Regex::new(r"([\d.]+)% packet loss")
        .unwrap()
        .captures(out)
        .and_then(|c| c[1].parse::<f64>().ok())
}

/// Parse `arp -a` output lines of the shape
/// `divines-mbp (192.168.1.173) at a4:83:e7:68:e2:30 on en0 ifscope [ethernet]`
/// into device candidates, deduped by ip within the scan.
pub fn parse_arp(out: &str) -> Vec<Device> {
    let line_re = Regex::new(r"(?i)^([\w\-\.]+) \(([0-9.]+)\) at ([0-9a-f:]+)").unwrap();
    let mut devices: Vec<Device> = Vec::new();
    for line in out.lines() {
        let Some(caps) = line_re.captures(line) else {
            continue;
        };
        let hostname = &caps[1];
        let ip = caps[2].to_string();
        let mac = caps[3].to_lowercase();
        if devices.iter().any(|d| d.ip == ip) {
            continue;
        }
        let device_type = classify_device(hostname, &ip, &mac);
        // Routers keep the raw hostname, which is usually the SSID.
        let name = if device_type == DeviceType::Router {
            hostname.to_string()
        } else {
            friendly_name(hostname)
        };
        devices.push(Device {
            id: format!("device-{}", uuid::Uuid::new_v4()),
            name,
            ip,
            mac,
            device_type,
            is_ethernet: line.contains("[ethernet]"),
            status: EntityStatus::Online,
            is_website_user: false,
        });
    }
    devices
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ARP_OUTPUT: &str = "\
divines-macbook-pro (192.168.1.173) at a4:83:e7:68:e2:30 on en0 ifscope permanent [ethernet]
MyRouterSSID (192.168.1.1) at 00:1a:2b:3c:4d:5e on en0 ifscope [ethernet]
android-c43a (192.168.1.42) at a8:9c:ed:11:22:33 on en0 ifscope
? (224.0.0.251) at ff:ff:ff:ff:ff:ff on en0 ifscope permanent
divines-macbook-2 (192.168.1.173) at a4:83:e7:68:e2:31 on en1 ifscope
";

    #[test]
    fn test_parse_arp_extracts_devices() {
        let devices = parse_arp(ARP_OUTPUT);
        // The `?` line does not match, and the duplicate ip is dropped.
        assert_eq!(devices.len(), 3);

        assert_eq!(devices[0].name, "macbook");
        assert_eq!(devices[0].ip, "192.168.1.173");
        assert_eq!(devices[0].mac, "a4:83:e7:68:e2:30");
        assert!(devices[0].is_ethernet);
        assert_eq!(devices[0].device_type, DeviceType::Computer);

        // The gateway keeps its SSID as display name.
        assert_eq!(devices[1].name, "MyRouterSSID");
        assert_eq!(devices[1].device_type, DeviceType::Router);

        assert_eq!(devices[2].device_type, DeviceType::Smartphone);
        assert!(!devices[2].is_ethernet);
    }

    #[test]
    fn test_parse_arp_ids_are_unique() {
        let devices = parse_arp(ARP_OUTPUT);
        let mut ids: Vec<&str> = devices.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), devices.len());
    }

    #[test]
    fn test_parse_speedtest() {
        let out = "Ping: 12.345 ms\nDownload: 123.45 Mbit/s\nUpload: 67.89 Mbit/s\n";
        let (latency, download, upload) = parse_speedtest(out);
        assert_eq!(latency, Some(12.345));
        assert_eq!(download, Some(123.45));
        assert_eq!(upload, Some(67.89));
    }

    #[test]
    fn test_parse_speedtest_partial_output() {
        let out = "Ping: 8.1 ms\nDownload failed\n";
        let (latency, download, upload) = parse_speedtest(out);
        assert_eq!(latency, Some(8.1));
        assert_eq!(download, None);
        assert_eq!(upload, None);
    }

    #[test]
    fn test_parse_ping_loss() {
        let out = "10 packets transmitted, 10 received, 0% packet loss, time 9012ms";
        assert_eq!(parse_ping_loss(out), Some(0.0));

        let out = "10 packets transmitted, 7 received, 30% packet loss";
        assert_eq!(parse_ping_loss(out), Some(30.0));

        assert_eq!(parse_ping_loss("no summary here"), None);
    }
}
