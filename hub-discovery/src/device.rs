//! Device description parsing and the static capability table.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// UPnP device description root element, root-level only — nested MS/MR
/// duplicates inside `<device><deviceList>` are never parsed, per spec.md
/// §4.1 ("parse the root-level UDN only").
#[derive(Debug, Deserialize)]
pub struct Root {
    pub device: DeviceDescription,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: String,
    pub model_name: String,
    pub model_number: Option<String>,
    pub serial_num: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    pub room_name: Option<String>,
    pub software_version: Option<String>,
    pub hardware_version: Option<String>,
}

impl DeviceDescription {
    pub fn from_xml(xml: &str) -> Option<Self> {
        let root: Root = quick_xml::de::from_str(xml).ok()?;
        Some(root.device)
    }

    pub fn is_zone_player(&self) -> bool {
        self.manufacturer.to_lowercase().contains("sonos")
            || self.device_type.contains("ZonePlayer")
    }

    /// Derive room name: prefer `ZoneName`/`roomName`; fall back to
    /// splitting `friendlyName` on `-`, per spec.md §4.1.
    pub fn room_name(&self) -> String {
        if let Some(room) = &self.room_name {
            if !room.is_empty() {
                return room.clone();
            }
        }
        self.friendly_name
            .split('-')
            .next()
            .unwrap_or(&self.friendly_name)
            .trim()
            .to_string()
    }
}

/// Capability flags derived from a static model table, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub coordinator_capable: bool,
    pub airplay_supported: bool,
    pub home_theater_capable: bool,
}

impl Default for ModelCapabilities {
    /// Permissive default: coordinator-capable=true, airplay=false.
    fn default() -> Self {
        Self {
            coordinator_capable: true,
            airplay_supported: false,
            home_theater_capable: false,
        }
    }
}

/// Static per-model capability table. Unknown models get the permissive
/// default from spec.md §3 rather than an error.
pub fn capabilities_for_model(model_name: &str) -> ModelCapabilities {
    let lower = model_name.to_lowercase();
    if lower.contains("sub") {
        return ModelCapabilities {
            coordinator_capable: false,
            airplay_supported: false,
            home_theater_capable: false,
        };
    }
    if lower.contains("arc") || lower.contains("beam") || lower.contains("playbase") || lower.contains("ray") {
        return ModelCapabilities {
            coordinator_capable: true,
            airplay_supported: true,
            home_theater_capable: true,
        };
    }
    if lower.contains("move") || lower.contains("roam") || lower.contains("five") || lower.contains("one") {
        return ModelCapabilities {
            coordinator_capable: true,
            airplay_supported: true,
            home_theater_capable: false,
        };
    }
    ModelCapabilities::default()
}

/// A device record as discovered, prior to any topology merge. Carries
/// the raw zone-group XML text verbatim so `hub-topology` can run its own
/// `ChannelMapSet` parse independently of this crate's own parsing.
#[derive(Debug, Clone)]
pub struct RawDevice {
    pub udn: String,
    pub ip: String,
    pub model_name: String,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
    pub software_version: Option<String>,
    pub hardware_version: Option<String>,
    pub room_name: String,
    pub airplay_hint: bool,
    pub zone_group_xml: Option<String>,
    pub discovered_at: DateTime<Utc>,
}

impl RawDevice {
    pub fn capabilities(&self) -> ModelCapabilities {
        let mut caps = capabilities_for_model(&self.model_name);
        caps.airplay_supported = caps.airplay_supported || self.airplay_hint;
        caps
    }
}

/// Extract the host portion of a `http://host:port/path` location URL.
pub fn extract_host_from_url(url: &str) -> Option<&str> {
    let without_scheme = url.split("//").nth(1)?;
    let host_port = without_scheme.split('/').next()?;
    host_port.split(':').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:ZonePlayer:1</deviceType>
    <friendlyName>Kitchen - Sonos One</friendlyName>
    <manufacturer>Sonos, Inc.</manufacturer>
    <modelName>Sonos One</modelName>
    <UDN>uuid:RINCON_000E58A0123456</UDN>
    <roomName>Kitchen</roomName>
  </device>
</root>"#;

    #[test]
    fn parses_root_level_fields() {
        let desc = DeviceDescription::from_xml(XML).unwrap();
        assert_eq!(desc.udn, "uuid:RINCON_000E58A0123456");
        assert!(desc.is_zone_player());
        assert_eq!(desc.room_name(), "Kitchen");
    }

    #[test]
    fn derives_room_from_friendly_name_when_absent() {
        let xml = XML.replace("<roomName>Kitchen</roomName>", "");
        let desc = DeviceDescription::from_xml(&xml).unwrap();
        assert_eq!(desc.room_name(), "Kitchen");
    }

    #[test]
    fn unknown_model_gets_permissive_default() {
        let caps = capabilities_for_model("Sonos Gizmo 9000");
        assert!(caps.coordinator_capable);
        assert!(!caps.airplay_supported);
    }

    #[test]
    fn sub_is_not_coordinator_capable() {
        let caps = capabilities_for_model("Sonos Sub");
        assert!(!caps.coordinator_capable);
    }

    #[test]
    fn extract_host() {
        assert_eq!(
            extract_host_from_url("http://192.168.1.100:1400/xml/device_description.xml"),
            Some("192.168.1.100")
        );
        assert_eq!(extract_host_from_url("garbage"), None);
    }
}
