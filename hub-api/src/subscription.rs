//! Raw UPnP event subscription verbs (`SUBSCRIBE`/`UNSUBSCRIBE`).
//!
//! These aren't SOAP actions; they're custom HTTP methods against the
//! service's event sub-URL. Grounded on the lifecycle shape of
//! `sonos-api/src/subscription.rs::ManagedSubscription`, minus the
//! stateful wrapper — `hub-event-ingress`'s renewal task owns timing.

use reqwest::Method;

use crate::actions::SubscriptionHandle;
use crate::error::{ApiError, Result};
use crate::service::Service;

fn event_sub_url(ip: &str, service: Service) -> String {
    let endpoint = service.info().endpoint.trim_end_matches("/Control");
    format!("http://{ip}:1400/{endpoint}/Event")
}

pub async fn subscribe(
    ip: &str,
    service: Service,
    callback_url: &str,
    timeout_seconds: u32,
) -> Result<SubscriptionHandle> {
    let client = reqwest::Client::new();
    let resp = client
        .request(
            Method::from_bytes(b"SUBSCRIBE").expect("static method name"),
            event_sub_url(ip, service),
        )
        .header("CALLBACK", format!("<{callback_url}>"))
        .header("NT", "upnp:event")
        .header("TIMEOUT", format!("Second-{timeout_seconds}"))
        .send()
        .await
        .map_err(|e| ApiError::Unreachable(e.to_string()))?;

    parse_subscription_response(resp).await
}

pub async fn renew(
    ip: &str,
    service: Service,
    sid: &str,
    timeout_seconds: u32,
) -> Result<SubscriptionHandle> {
    let client = reqwest::Client::new();
    let resp = client
        .request(
            Method::from_bytes(b"SUBSCRIBE").expect("static method name"),
            event_sub_url(ip, service),
        )
        .header("SID", sid)
        .header("TIMEOUT", format!("Second-{timeout_seconds}"))
        .send()
        .await
        .map_err(|e| ApiError::Unreachable(e.to_string()))?;

    parse_subscription_response(resp).await
}

pub async fn unsubscribe(ip: &str, service: Service, sid: &str) -> Result<()> {
    let client = reqwest::Client::new();
    client
        .request(
            Method::from_bytes(b"UNSUBSCRIBE").expect("static method name"),
            event_sub_url(ip, service),
        )
        .header("SID", sid)
        .send()
        .await
        .map_err(|e| ApiError::Unreachable(e.to_string()))?;
    Ok(())
}

async fn parse_subscription_response(resp: reqwest::Response) -> Result<SubscriptionHandle> {
    if !resp.status().is_success() {
        return Err(ApiError::Unreachable(format!("http status {}", resp.status())));
    }
    let sid = resp
        .headers()
        .get("SID")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidResponse("missing SID header".into()))?
        .to_string();
    let timeout_seconds = resp
        .headers()
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Second-"))
        .and_then(|s| s.parse().ok())
        .unwrap_or(1800);
    Ok(SubscriptionHandle { sid, timeout_seconds })
}
