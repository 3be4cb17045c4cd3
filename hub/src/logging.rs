//! Structured logging init, adapted from the SDK's `SONOS_LOG_LEVEL` /
//! `RUST_LOG` fallback chain — this binary always logs to stderr, no silent
//! TUI mode.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

fn env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("HUB_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new("info")
    }
}

pub fn init() {
    let subscriber = Registry::default().with(fmt::layer().with_target(true)).with(env_filter());
    if subscriber.try_init().is_err() {
        // Already initialized (e.g. under a test harness) — not fatal.
    }
}
