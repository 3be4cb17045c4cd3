//! Async SOAP client for UPnP device communication.
//!
//! This is the transport layer the hub uses to talk to exactly one player.
//! It knows nothing about which action means what — callers in `hub-api`
//! supply the action name, service URI and payload body; this crate builds
//! the envelope, posts it, and hands back the parsed response element or a
//! typed failure.

mod error;

pub use error::{Result, SoapError};

use std::time::Duration;
use xmltree::Element;

/// Per-call timeout defaults from spec.md §4.3 / §6 (`SONOS_TIMEOUT_MS`).
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// A minimal async SOAP client for UPnP device communication.
pub struct SoapClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl SoapClient {
    /// Create a client with the default 5s per-call timeout.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_CALL_TIMEOUT)
    }

    /// Create a client with an explicit per-call timeout (`SONOS_TIMEOUT_MS`).
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(3))
                .build()
                .expect("reqwest client builds with static config"),
            timeout,
        }
    }

    /// Send a SOAP request and return the parsed response element.
    ///
    /// `endpoint` is the control-URL path (e.g. `MediaRenderer/AVTransport/Control`),
    /// `service_uri` the `urn:schemas-upnp-org:service:...` namespace, `action`
    /// the UPnP action name, and `payload` the pre-rendered argument XML.
    pub async fn call(
        &self,
        ip: &str,
        endpoint: &str,
        service_uri: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element> {
        let body = format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
                <s:Body>
                    <u:{action} xmlns:u="{service_uri}">
                        {payload}
                    </u:{action}>
                </s:Body>
            </s:Envelope>"#,
            action = action,
            service_uri = service_uri,
            payload = payload
        );

        let url = format!("http://{ip}:1400/{endpoint}");
        let soap_action = format!("\"{service_uri}#{action}\"");

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .post(&url)
                .header("Content-Type", "text/xml; charset=\"utf-8\"")
                .header("SOAPACTION", soap_action)
                .body(body)
                .send(),
        )
        .await
        .map_err(|_| SoapError::Timeout(self.timeout))?
        .map_err(|e| SoapError::Unreachable(e.to_string()))?;

        let status = response.status();
        let xml_text = response
            .text()
            .await
            .map_err(|e| SoapError::Unreachable(e.to_string()))?;

        let xml = Element::parse(xml_text.as_bytes())
            .map_err(|e| SoapError::InvalidResponse(e.to_string()))?;

        if !status.is_success() && status.as_u16() != 500 {
            return Err(SoapError::Unreachable(format!("http status {status}")));
        }

        self.extract_response(&xml, action)
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::InvalidResponse("missing SOAP Body".to_string()))?;

        if let Some(fault) = body.get_child("Fault") {
            let error_code = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError"))
                .and_then(|e| e.get_child("errorCode"))
                .and_then(|c| c.get_text())
                .and_then(|t| t.parse::<u16>().ok())
                .unwrap_or(500);
            return Err(SoapError::Fault(error_code));
        }

        let response_name = format!("{action}Response");
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::InvalidResponse(format!("missing {response_name} element")))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_response_ok() {
        let client = SoapClient::new();
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <u:PlayResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"></u:PlayResponse>
                </s:Body>
            </s:Envelope>
        "#;
        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        let response = client.extract_response(&xml, "Play").unwrap();
        assert_eq!(response.name, "PlayResponse");
    }

    #[test]
    fn extract_response_fault() {
        let client = SoapClient::new();
        let xml_str = r#"
            <s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
                <s:Body>
                    <s:Fault>
                        <faultcode>s:Client</faultcode>
                        <faultstring>UPnPError</faultstring>
                        <detail>
                            <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                                <errorCode>701</errorCode>
                            </UPnPError>
                        </detail>
                    </s:Fault>
                </s:Body>
            </s:Envelope>
        "#;
        let xml = Element::parse(xml_str.as_bytes()).unwrap();
        match client.extract_response(&xml, "Play").unwrap_err() {
            SoapError::Fault(code) => assert_eq!(code, 701),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn extract_response_missing_body() {
        let client = SoapClient::new();
        let xml = Element::parse(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"></s:Envelope>"#
                .as_bytes(),
        )
        .unwrap();
        assert!(matches!(
            client.extract_response(&xml, "Play").unwrap_err(),
            SoapError::InvalidResponse(_)
        ));
    }
}
