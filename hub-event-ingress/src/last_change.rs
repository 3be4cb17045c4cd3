//! Decodes a UPnP `LastChange` event body into a state-cache patch.
//!
//! `LastChange` is itself an XML document carrying self-closing elements
//! with only a `val` attribute (optionally channel-qualified, e.g.
//! `<Volume channel="Master" val="35"/>`); it doesn't fit a fixed serde
//! schema, so this walks it with `quick_xml::Reader` directly.

use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;

use hub_state_cache::{PlaybackStatePatch, Source, TransportState};

#[derive(Debug, Default)]
struct RawFields {
    transport_state: Option<String>,
    track_uri: Option<String>,
    track_duration: Option<String>,
    track_metadata: Option<String>,
    volume_master: Option<String>,
    mute_master: Option<String>,
}

fn transport_state_from_str(s: &str) -> TransportState {
    match s {
        "PLAYING" => TransportState::Playing,
        "PAUSED_PLAYBACK" => TransportState::Paused,
        "STOPPED" => TransportState::Stopped,
        "TRANSITIONING" => TransportState::Transitioning,
        _ => TransportState::Other,
    }
}

/// Parse HH:MM:SS into milliseconds; malformed input yields `None` rather
/// than failing the whole decode.
fn parse_time_to_ms(time: &str) -> Option<u64> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let h: u64 = parts[0].parse().ok()?;
    let m: u64 = parts[1].parse().ok()?;
    let s: u64 = parts[2].parse().ok()?;
    Some(((h * 60 + m) * 60 + s) * 1000)
}

fn attr_value(e: &quick_xml::events::BytesStart, name: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        if a.key.as_ref() == name {
            Some(String::from_utf8_lossy(&a.value).to_string())
        } else {
            None
        }
    })
}

fn parse_raw_fields(xml: &str) -> RawFields {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut fields = RawFields::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                let name = e.name();
                let local = String::from_utf8_lossy(name.as_ref()).to_string();
                let local = local.split(':').last().unwrap_or(&local).to_string();
                let val = attr_value(&e, b"val");
                let channel = attr_value(&e, b"channel");

                match local.as_str() {
                    "TransportState" => fields.transport_state = val,
                    "CurrentTrackURI" => fields.track_uri = val,
                    "CurrentTrackDuration" => fields.track_duration = val,
                    "CurrentTrackMetaData" => fields.track_metadata = val,
                    "Volume" if channel.as_deref() == Some("Master") || channel.is_none() => {
                        fields.volume_master = val;
                    }
                    "Mute" if channel.as_deref() == Some("Master") || channel.is_none() => {
                        fields.mute_master = val;
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "malformed LastChange xml, stopping parse");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    fields
}

/// Decode a `LastChange` body (the event's NOTIFY payload, after the
/// outer `propertyset`/`property` unwrap) into a patch. Unknown or
/// unparseable sub-fields are simply omitted rather than failing the
/// whole decode — UPnP events routinely carry partial snapshots.
pub fn decode_last_change(xml: &str) -> PlaybackStatePatch {
    let fields = parse_raw_fields(xml);
    let mut patch = PlaybackStatePatch::new(Utc::now(), Source::Event);

    if let Some(state) = &fields.transport_state {
        patch.transport_state = Some(transport_state_from_str(state));
    }
    patch.current_track_uri = fields.track_uri;
    patch.duration_ms = fields.track_duration.as_deref().and_then(parse_time_to_ms);
    patch.track_metadata = fields.track_metadata;
    patch.volume = fields.volume_master.and_then(|v| v.parse().ok());
    patch.muted = fields.mute_master.map(|v| v == "1");

    patch
}

/// Extracts the (possibly HTML-entity-encoded) inner `LastChange` text
/// from the `<e:propertyset><e:property><LastChange>...` wrapper UPnP
/// wraps every NOTIFY body in.
pub fn extract_last_change_body(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_last_change = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if name.split(':').last() == Some("LastChange") {
                    in_last_change = true;
                }
            }
            Ok(Event::Text(t)) if in_last_change => {
                return t.unescape().ok().map(|s| s.to_string());
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_transport_state_and_track_uri() {
        let xml = r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0"><TransportState val="PLAYING"/><CurrentTrackURI val="x-sonos-spotify:track123"/><CurrentTrackDuration val="0:03:45"/></InstanceID></Event>"#;
        let patch = decode_last_change(xml);
        assert_eq!(patch.transport_state, Some(TransportState::Playing));
        assert_eq!(patch.current_track_uri, Some("x-sonos-spotify:track123".to_string()));
        assert_eq!(patch.duration_ms, Some(225_000));
    }

    #[test]
    fn decodes_volume_and_mute() {
        let xml = r#"<Event><InstanceID val="0"><Volume channel="Master" val="35"/><Mute channel="Master" val="1"/></InstanceID></Event>"#;
        let patch = decode_last_change(xml);
        assert_eq!(patch.volume, Some(35));
        assert_eq!(patch.muted, Some(true));
    }

    #[test]
    fn malformed_xml_yields_empty_patch() {
        let patch = decode_last_change("<Event><InstanceID");
        assert!(patch.transport_state.is_none());
    }

    #[test]
    fn extracts_entity_encoded_last_change() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>&lt;Event&gt;&lt;InstanceID val=&quot;0&quot;&gt;&lt;TransportState val=&quot;PLAYING&quot;/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property></e:propertyset>"#;
        let body = extract_last_change_body(xml).unwrap();
        let patch = decode_last_change(&body);
        assert_eq!(patch.transport_state, Some(TransportState::Playing));
    }
}
