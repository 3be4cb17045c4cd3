//! Typed UPnP actions used by the hub core.
//!
//! Every action spec.md §4.3 names is one async method here, using the
//! same `xmltree` payload/response idiom throughout, flattened into direct
//! methods instead of a macro-generated operation framework — the fixed,
//! known set of actions the engine needs doesn't benefit from that
//! generality.

use hub_soap_client::SoapClient;
use xmltree::Element;

use crate::error::{ApiError, Result};
use crate::service::Service;

/// Transport state as reported by `GetTransportInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Playing,
    Paused,
    Stopped,
    Transitioning,
    Other,
}

impl From<&str> for TransportState {
    fn from(s: &str) -> Self {
        match s {
            "PLAYING" => TransportState::Playing,
            "PAUSED_PLAYBACK" => TransportState::Paused,
            "STOPPED" => TransportState::Stopped,
            "TRANSITIONING" => TransportState::Transitioning,
            _ => TransportState::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportInfo {
    pub state: TransportState,
    pub status: String,
}

#[derive(Debug, Clone, Default)]
pub struct PositionInfo {
    pub track_uri: String,
    pub rel_time: String,
    pub duration: String,
}

#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    pub sid: String,
    pub timeout_seconds: u32,
}

/// Typed actions for one player, addressed by IP each call (the same
/// client is reused across every coordinator, matching `SoapClient`'s
/// statelessness).
#[derive(Clone)]
pub struct PlayerActions {
    client: std::sync::Arc<SoapClient>,
}

fn text_child(xml: &Element, name: &str) -> Result<String> {
    xml.get_child(name)
        .and_then(|e| e.get_text())
        .map(|t| t.to_string())
        .ok_or_else(|| ApiError::InvalidResponse(format!("missing {name}")))
}

impl PlayerActions {
    pub fn new(client: std::sync::Arc<SoapClient>) -> Self {
        Self { client }
    }

    async fn call(&self, ip: &str, service: Service, action: &str, payload: &str) -> Result<Element> {
        let info = service.info();
        self.client
            .call(ip, info.endpoint, info.service_uri, action, payload)
            .await
            .map_err(ApiError::from)
    }

    pub async fn play(&self, ip: &str) -> Result<()> {
        self.call(
            ip,
            Service::AVTransport,
            "Play",
            "<InstanceID>0</InstanceID><Speed>1</Speed>",
        )
        .await?;
        Ok(())
    }

    pub async fn pause(&self, ip: &str) -> Result<()> {
        self.call(ip, Service::AVTransport, "Pause", "<InstanceID>0</InstanceID>")
            .await?;
        Ok(())
    }

    pub async fn stop(&self, ip: &str) -> Result<()> {
        self.call(ip, Service::AVTransport, "Stop", "<InstanceID>0</InstanceID>")
            .await?;
        Ok(())
    }

    pub async fn seek(&self, ip: &str, unit: &str, target: &str) -> Result<()> {
        let payload = format!(
            "<InstanceID>0</InstanceID><Unit>{unit}</Unit><Target>{target}</Target>"
        );
        self.call(ip, Service::AVTransport, "Seek", &payload).await?;
        Ok(())
    }

    pub async fn set_av_transport_uri(&self, ip: &str, uri: &str, metadata: &str) -> Result<()> {
        let payload = format!(
            "<InstanceID>0</InstanceID><CurrentURI>{}</CurrentURI><CurrentURIMetaData>{}</CurrentURIMetaData>",
            escape_xml(uri),
            escape_xml(metadata)
        );
        self.call(ip, Service::AVTransport, "SetAVTransportURI", &payload)
            .await?;
        Ok(())
    }

    pub async fn get_transport_info(&self, ip: &str) -> Result<TransportInfo> {
        let xml = self
            .call(ip, Service::AVTransport, "GetTransportInfo", "<InstanceID>0</InstanceID>")
            .await?;
        Ok(TransportInfo {
            state: TransportState::from(text_child(&xml, "CurrentTransportState")?.as_str()),
            status: text_child(&xml, "CurrentTransportStatus").unwrap_or_default(),
        })
    }

    pub async fn get_position_info(&self, ip: &str) -> Result<PositionInfo> {
        let xml = self
            .call(ip, Service::AVTransport, "GetPositionInfo", "<InstanceID>0</InstanceID>")
            .await?;
        Ok(PositionInfo {
            track_uri: text_child(&xml, "TrackURI").unwrap_or_default(),
            rel_time: text_child(&xml, "RelTime").unwrap_or_default(),
            duration: text_child(&xml, "TrackDuration").unwrap_or_default(),
        })
    }

    pub async fn set_volume(&self, ip: &str, volume: u8) -> Result<()> {
        let payload = format!(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredVolume>{volume}</DesiredVolume>"
        );
        self.call(ip, Service::RenderingControl, "SetVolume", &payload)
            .await?;
        Ok(())
    }

    pub async fn set_relative_volume(&self, ip: &str, delta: i16) -> Result<()> {
        let payload = format!(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><Adjustment>{delta}</Adjustment>"
        );
        self.call(ip, Service::RenderingControl, "SetRelativeVolume", &payload)
            .await?;
        Ok(())
    }

    pub async fn get_volume(&self, ip: &str) -> Result<u8> {
        let xml = self
            .call(
                ip,
                Service::RenderingControl,
                "GetVolume",
                "<InstanceID>0</InstanceID><Channel>Master</Channel>",
            )
            .await?;
        text_child(&xml, "CurrentVolume")?
            .parse()
            .map_err(|_| ApiError::InvalidResponse("CurrentVolume not numeric".into()))
    }

    pub async fn set_mute(&self, ip: &str, muted: bool) -> Result<()> {
        let payload = format!(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredMute>{}</DesiredMute>",
            if muted { 1 } else { 0 }
        );
        self.call(ip, Service::RenderingControl, "SetMute", &payload)
            .await?;
        Ok(())
    }

    pub async fn get_zone_group_state(&self, ip: &str) -> Result<String> {
        let xml = self
            .call(ip, Service::ZoneGroupTopology, "GetZoneGroupState", "")
            .await?;
        text_child(&xml, "ZoneGroupState")
    }

    pub async fn add_member(&self, coordinator_ip: &str, member_udn: &str, boot_seq: u32) -> Result<()> {
        let payload = format!(
            "<MemberID>{member_udn}</MemberID><BootSeq>{boot_seq}</BootSeq>"
        );
        self.call(coordinator_ip, Service::GroupManagement, "AddMember", &payload)
            .await?;
        Ok(())
    }

    pub async fn remove_member(&self, coordinator_ip: &str, member_udn: &str) -> Result<()> {
        let payload = format!("<MemberID>{member_udn}</MemberID>");
        self.call(coordinator_ip, Service::GroupManagement, "RemoveMember", &payload)
            .await?;
        Ok(())
    }

    pub async fn browse(
        &self,
        ip: &str,
        object_id: &str,
        browse_flag: &str,
        start: u32,
        count: u32,
    ) -> Result<String> {
        let payload = format!(
            "<ObjectID>{object_id}</ObjectID><BrowseFlag>{browse_flag}</BrowseFlag>\
             <Filter>*</Filter><StartingIndex>{start}</StartingIndex>\
             <RequestedCount>{count}</RequestedCount><SortCriteria></SortCriteria>"
        );
        let xml = self
            .call(ip, Service::ContentDirectory, "Browse", &payload)
            .await?;
        text_child(&xml, "Result")
    }

    /// `Subscribe`/`Unsubscribe` are not SOAP actions — they're the UPnP
    /// `SUBSCRIBE`/`UNSUBSCRIBE` HTTP verbs against the service's event
    /// sub-URL. Kept in this crate because they share the service table.
    pub async fn subscribe(
        &self,
        ip: &str,
        service: Service,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionHandle> {
        crate::subscription::subscribe(ip, service, callback_url, timeout_seconds).await
    }

    pub async fn renew_subscription(
        &self,
        ip: &str,
        service: Service,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionHandle> {
        crate::subscription::renew(ip, service, sid, timeout_seconds).await
    }

    pub async fn unsubscribe(&self, ip: &str, service: Service, sid: &str) -> Result<()> {
        crate::subscription::unsubscribe(ip, service, sid).await
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
