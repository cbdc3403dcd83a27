// crates/core/src/classify.rs
//! Name and address heuristics: device-type inference from hostname/ip/mac
//! and the generic-name predicate used by the merge paths.
//!
//! Everything here is a pure function over strings so the string-matching
//! identity rules stay unit-testable in isolation from any I/O.

use regex_lite::Regex;

use crate::model::DeviceType;

/// Hostname markers that identify a handset.
const SMARTPHONE_MARKERS: &str = "iphone|android|pixel|galaxy|samsung|xiaomi|huawei|oneplus";
/// Hostname markers that identify a desktop/laptop.
const COMPUTER_MARKERS: &str = "macbook|imac|windows|linux|ubuntu|surface|desktop|laptop|ipad";
/// Hostname markers for embedded/smart-home gear.
const IOT_MARKERS: &str = "esp|tasmota|shelly|hue|nest|ring|tuya|sonos";
/// Hostname markers for consoles.
const GAMING_MARKERS: &str = "playstation|xbox|nintendo|steamdeck|ps4|ps5";

/// Infer a device type from whatever the scan gave us.
///
/// Gateway-shaped IPs win over hostname markers: a router advertising an
/// SSID as its hostname would otherwise classify as `other`.
pub fn classify_device(name: &str, ip: &str, mac: &str) -> DeviceType {
    if is_gateway_ip(ip) {
        return DeviceType::Router;
    }
    let lower = name.to_lowercase();
    let matches = |markers: &str| {
        Regex::new(&format!("({markers})"))
            .unwrap()
            .is_match(&lower)
    };
    if matches(SMARTPHONE_MARKERS) {
        return DeviceType::Smartphone;
    }
    if matches(GAMING_MARKERS) {
        return DeviceType::Gaming;
    }
    if matches(IOT_MARKERS) {
        return DeviceType::Iot;
    }
    if matches(COMPUTER_MARKERS) {
        return DeviceType::Computer;
    }
    // Handset OUI prefixes seen in the wild on phone wifi radios.
    let mac = mac.to_lowercase();
    if mac.starts_with("a8:") || mac.starts_with("ac:") {
        return DeviceType::Smartphone;
    }
    DeviceType::Other
}

/// First-host-in-subnet shapes commonly used by home gateways.
pub fn is_gateway_ip(ip: &str) -> bool {
    Regex::new(r"^(192\.168\.\d{1,3}|10\.0\.0|172\.16\.0)\.1$")
        .unwrap()
        .is_match(ip)
}

/// Extract a human-friendly display name from a raw hostname.
///
/// When the hostname embeds an OS/vendor marker ("divines-iphone-12"),
/// the marker reads better on a graph node than the full mDNS name.
pub fn friendly_name(hostname: &str) -> String {
    let re = Regex::new(&format!(
        "({SMARTPHONE_MARKERS}|{COMPUTER_MARKERS}|{GAMING_MARKERS}|mac)"
    ))
    .unwrap();
    match re.find(&hostname.to_lowercase()) {
        Some(m) => m.as_str().to_string(),
        None => hostname.to_string(),
    }
}

/// The generic-name predicate: is this display name a placeholder that a
/// better name from another source may overwrite?
pub fn is_generic_name(name: &str) -> bool {
    let name = name.trim();
    if name.chars().count() < 3 {
        return true;
    }
    // Purely numeric, or a raw IPv4 address.
    if Regex::new(r"^\d+$").unwrap().is_match(name) {
        return true;
    }
    if Regex::new(r"^\d{1,3}(\.\d{1,3}){3}$").unwrap().is_match(name) {
        return true;
    }
    // Known placeholder patterns from the discovery sources.
    let lower = name.to_lowercase();
    if Regex::new(r"^(device|computer)$").unwrap().is_match(&lower)
        || Regex::new(r"^device-\d+$").unwrap().is_match(&lower)
        || Regex::new(r"^(web )?user[- ]\d+$").unwrap().is_match(&lower)
        || lower.starts_with("unknown")
    {
        return true;
    }
    // Browser user-agent text leaking in as a "name".
    Regex::new(r"(mozilla|applewebkit|chrome|safari|firefox|gecko)")
        .unwrap()
        .is_match(&lower)
}

/// Merge rule for display names: the candidate overrides, except that a
/// generic candidate never replaces a specific current name.
pub fn better_name(current: &str, candidate: &str) -> String {
    if candidate.trim().is_empty() {
        return current.to_string();
    }
    if is_generic_name(candidate) && !is_generic_name(current) {
        return current.to_string();
    }
    candidate.to_string()
}
