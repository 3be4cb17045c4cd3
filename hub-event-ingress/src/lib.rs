//! Event ingress: UPnP NOTIFY callbacks, cloud webhook push, and the
//! SOAP pull-path fallback, all feeding `hub-state-cache`.

mod error;
mod last_change;
mod notify;
mod pull;
mod server;
mod subscriptions;
mod webhook;

pub use error::{IngressError, Result};
pub use last_change::{decode_last_change, extract_last_change_body};
pub use notify::SidResolver;
pub use pull::poll_and_apply;
pub use server::IngressServer;
pub use subscriptions::SubscriptionRegistry;
pub use webhook::GroupToIpResolver;
