//! UPnP service definitions: endpoint path + service URI pairs.

/// UPnP services exposed by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    AVTransport,
    RenderingControl,
    GroupRenderingControl,
    GroupManagement,
    ZoneGroupTopology,
    ContentDirectory,
}

/// Service configuration information.
pub struct ServiceInfo {
    pub endpoint: &'static str,
    pub service_uri: &'static str,
}

impl Service {
    pub fn info(&self) -> ServiceInfo {
        match self {
            Service::AVTransport => ServiceInfo {
                endpoint: "MediaRenderer/AVTransport/Control",
                service_uri: "urn:schemas-upnp-org:service:AVTransport:1",
            },
            Service::RenderingControl => ServiceInfo {
                endpoint: "MediaRenderer/RenderingControl/Control",
                service_uri: "urn:schemas-upnp-org:service:RenderingControl:1",
            },
            Service::GroupRenderingControl => ServiceInfo {
                endpoint: "MediaRenderer/GroupRenderingControl/Control",
                service_uri: "urn:schemas-upnp-org:service:GroupRenderingControl:1",
            },
            Service::GroupManagement => ServiceInfo {
                endpoint: "GroupManagement/Control",
                service_uri: "urn:schemas-upnp-org:service:GroupManagement:1",
            },
            Service::ZoneGroupTopology => ServiceInfo {
                endpoint: "ZoneGroupTopology/Control",
                service_uri: "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
            },
            Service::ContentDirectory => ServiceInfo {
                endpoint: "MediaServer/ContentDirectory/Control",
                service_uri: "urn:schemas-upnp-org:service:ContentDirectory:1",
            },
        }
    }
}
