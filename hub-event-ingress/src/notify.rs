//! The warp filter that accepts UPnP NOTIFY requests.

use std::sync::Arc;

use hub_state_cache::StateSink;
use warp::Filter;

use crate::last_change::{decode_last_change, extract_last_change_body};
use crate::subscriptions::SubscriptionRegistry;

#[derive(Debug)]
struct InvalidUpnpHeaders;
impl warp::reject::Reject for InvalidUpnpHeaders {}

#[derive(Debug)]
struct UnknownSubscription;
impl warp::reject::Reject for UnknownSubscription {}

/// Maps a SID to the UDN/IP the patch should be applied under. In
/// practice this is "the IP this subscription was made to" — tracked by
/// the registry at subscribe time.
pub trait SidResolver: Send + Sync {
    fn resolve(&self, sid: &str) -> Option<(String, String)>;
}

pub fn notify_route(
    registry: Arc<SubscriptionRegistry>,
    sid_resolver: Arc<dyn SidResolver>,
    sink: Arc<dyn StateSink>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::body::bytes())
        .and_then(move |method: warp::http::Method, sid: Option<String>, nt: Option<String>, nts: Option<String>, body: bytes::Bytes| {
            let registry = registry.clone();
            let sid_resolver = sid_resolver.clone();
            let sink = sink.clone();
            async move {
                if method != warp::http::Method::from_bytes(b"NOTIFY").unwrap() {
                    return Err(warp::reject::not_found());
                }
                if !validate_upnp_headers(&sid, &nt, &nts) {
                    return Err(warp::reject::custom(InvalidUpnpHeaders));
                }
                let sid = sid.ok_or_else(|| warp::reject::custom(InvalidUpnpHeaders))?;

                if !registry.is_registered(&sid).await {
                    return Err(warp::reject::custom(UnknownSubscription));
                }

                let Some((udn, ip)) = sid_resolver.resolve(&sid) else {
                    return Err(warp::reject::custom(UnknownSubscription));
                };

                let event_xml = String::from_utf8_lossy(&body).to_string();
                if let Some(last_change) = extract_last_change_body(&event_xml) {
                    let patch = decode_last_change(&last_change);
                    sink.apply(&udn, &ip, patch);
                }

                Ok::<_, warp::Rejection>(warp::reply::with_status("", warp::http::StatusCode::OK))
            }
        })
}

fn validate_upnp_headers(sid: &Option<String>, nt: &Option<String>, nts: &Option<String>) -> bool {
    if sid.is_none() {
        return false;
    }
    if let (Some(nt), Some(nts)) = (nt, nts) {
        if nt != "upnp:event" || nts != "upnp:propchange" {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_sid() {
        assert!(!validate_upnp_headers(&None, &None, &None));
    }

    #[test]
    fn rejects_wrong_nt_nts() {
        assert!(!validate_upnp_headers(
            &Some("sid".into()),
            &Some("wrong".into()),
            &Some("upnp:propchange".into())
        ));
    }

    #[test]
    fn accepts_sid_only() {
        assert!(validate_upnp_headers(&Some("sid".into()), &None, &None));
    }
}
