//! Async SSDP (Simple Service Discovery Protocol) client.
//!
//! Not part of the public API; `discovery` drives this to collect
//! `SsdpResponse`s over one or more M-SEARCH passes.

use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::{DiscoveryError, Result};

pub(crate) const MULTICAST_ADDR: &str = "239.255.255.250:1900";
pub(crate) const SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SsdpResponse {
    pub location: String,
    pub usn: String,
    pub server: Option<String>,
}

pub(crate) struct SsdpClient {
    socket: UdpSocket,
}

impl SsdpClient {
    pub async fn new() -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| DiscoveryError::SocketError(e.to_string()))?;
        socket
            .set_broadcast(true)
            .map_err(|e| DiscoveryError::SocketError(e.to_string()))?;
        Ok(Self { socket })
    }

    /// Send one M-SEARCH and collect responses until `window` elapses.
    pub async fn search_once(&self, window: Duration) -> Result<Vec<SsdpResponse>> {
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {MULTICAST_ADDR}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: 2\r\n\
             ST: {SEARCH_TARGET}\r\n\
             USER-AGENT: household-hub/1.0 UPnP/1.0\r\n\
             \r\n"
        );

        self.socket
            .send_to(request.as_bytes(), MULTICAST_ADDR)
            .await
            .map_err(|e| DiscoveryError::SocketError(e.to_string()))?;

        let mut responses = Vec::new();
        let mut buf = [0u8; 2048];
        let deadline = tokio::time::Instant::now() + window;

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((n, _))) => {
                    if let Ok(text) = std::str::from_utf8(&buf[..n]) {
                        if let Some(resp) = parse_ssdp_response(text) {
                            responses.push(resp);
                        }
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "ssdp recv error, continuing");
                }
                Err(_) => break,
            }
        }

        Ok(responses)
    }
}

fn parse_ssdp_response(response: &str) -> Option<SsdpResponse> {
    let mut location = None;
    let mut usn = None;
    let mut server = None;

    for line in response.lines() {
        let line = line.trim();
        if let Some(v) = extract_header(line, "LOCATION:") {
            location = Some(v);
        } else if let Some(v) = extract_header(line, "USN:") {
            usn = Some(v);
        } else if let Some(v) = extract_header(line, "SERVER:") {
            server = Some(v);
        }
    }

    Some(SsdpResponse {
        location: location?,
        usn: usn?,
        server,
    })
}

fn extract_header(line: &str, header: &str) -> Option<String> {
    if line.len() > header.len() && line[..header.len()].eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim().to_string())
    } else {
        None
    }
}

pub(crate) fn is_likely_sonos(resp: &SsdpResponse) -> bool {
    resp.usn.contains("RINCON")
        || resp
            .server
            .as_ref()
            .is_some_and(|s| s.to_lowercase().contains("sonos"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_location_usn_server() {
        let raw = "HTTP/1.1 200 OK\r\n\
            LOCATION: http://192.168.1.100:1400/xml/device_description.xml\r\n\
            ST: urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
            USN: uuid:RINCON_000E58A0123456::urn:schemas-upnp-org:device:ZonePlayer:1\r\n\
            SERVER: Linux/3.14.0 UPnP/1.0 Sonos/70.3-35220\r\n\
            \r\n";
        let parsed = parse_ssdp_response(raw).unwrap();
        assert_eq!(
            parsed.location,
            "http://192.168.1.100:1400/xml/device_description.xml"
        );
        assert!(is_likely_sonos(&parsed));
    }

    #[test]
    fn missing_location_yields_none() {
        let raw = "HTTP/1.1 200 OK\r\nUSN: uuid:x\r\n\r\n";
        assert!(parse_ssdp_response(raw).is_none());
    }
}
