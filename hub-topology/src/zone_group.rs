//! Parsing of the raw `ZoneGroupState` XML carried verbatim on `RawDevice`.
//!
//! Trimmed to the attributes topology merging actually needs; the full
//! UPnP `ZoneGroupState` schema carries dozens more per-member diagnostic
//! attributes that have no bearing on grouping or pairing.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "ZoneGroupState")]
pub struct ZoneGroupState {
    #[serde(rename = "ZoneGroups", default)]
    pub zone_groups: ZoneGroups,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneGroups {
    #[serde(rename = "ZoneGroup", default)]
    pub groups: Vec<ZoneGroup>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneGroup {
    #[serde(rename = "@Coordinator")]
    pub coordinator: String,
    #[serde(rename = "@ID")]
    pub id: String,
    #[serde(rename = "ZoneGroupMember", default)]
    pub members: Vec<ZoneGroupMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ZoneGroupMember {
    #[serde(rename = "@UUID")]
    pub uuid: String,
    #[serde(rename = "@ZoneName")]
    pub zone_name: String,
    #[serde(rename = "@HTSatChanMapSet", default)]
    pub ht_sat_chan_map_set: Option<String>,
    #[serde(rename = "Satellite", default)]
    pub satellites: Vec<Satellite>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Satellite {
    #[serde(rename = "@UUID")]
    pub uuid: String,
    #[serde(rename = "@ZoneName", default)]
    pub zone_name: String,
}

impl ZoneGroupState {
    pub fn from_xml(xml: &str) -> Option<Self> {
        quick_xml::de::from_str(xml).ok()
    }
}

/// A `ChannelMapSet` of the form `UDN1:LF,LF;UDN2:RF,RF` — maps each
/// referenced UDN to its channel label for stereo-pair detection.
pub fn parse_channel_map(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|entry| {
            let (udn, channels) = entry.split_once(':')?;
            Some((udn.trim().to_string(), channels.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_1" ID="RINCON_1:0"><ZoneGroupMember UUID="RINCON_1" ZoneName="Living Room (L)" HTSatChanMapSet="RINCON_1:LF,LF;RINCON_2:RF,RF"/><ZoneGroupMember UUID="RINCON_2" ZoneName="Living Room (R)"/></ZoneGroup></ZoneGroups></ZoneGroupState>"#;

    #[test]
    fn parses_group_and_members() {
        let state = ZoneGroupState::from_xml(XML).unwrap();
        assert_eq!(state.zone_groups.groups.len(), 1);
        let group = &state.zone_groups.groups[0];
        assert_eq!(group.coordinator, "RINCON_1");
        assert_eq!(group.members.len(), 2);
    }

    #[test]
    fn parses_channel_map() {
        let pairs = parse_channel_map("RINCON_1:LF,LF;RINCON_2:RF,RF");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("RINCON_1".to_string(), "LF,LF".to_string()));
        assert_eq!(pairs[1], ("RINCON_2".to_string(), "RF,RF".to_string()));
    }
}
