//! The minimal inbound HTTP surface this binary owns directly: `/v1/health`
//! and `/metrics`. Full JSON API routing, JWT pairing/refresh, and the
//! rest of `/v1/...` are out of scope (spec.md §1) — this is only the two
//! public, unauthenticated paths spec.md §6 still requires.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use warp::Filter;

use crate::adapters::TopologyHandle;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    devices: usize,
}

pub struct HealthServer {
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl HealthServer {
    pub async fn start(host: IpAddr, port: u16, topology: Arc<TopologyHandle>) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let health_topology = topology.clone();
        let health = warp::path!("v1" / "health").map(move || {
            let snapshot = health_topology.get();
            warp::reply::json(&HealthBody { status: "ok", devices: snapshot.physical.len() })
        });

        let metrics_topology = topology;
        let metrics = warp::path!("metrics").map(move || {
            let snapshot = metrics_topology.get();
            format!(
                "hub_devices_total {}\nhub_logical_devices_total {}\n",
                snapshot.physical.len(),
                snapshot.logical.len(),
            )
        });

        let routes = health.or(metrics);

        let server_handle = tokio::spawn(async move {
            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(SocketAddr::new(host, port), async move {
                shutdown_rx.recv().await;
            });
            tracing::info!(%addr, "health/metrics server listening");
            let _ = ready_tx.send(()).await;
            server.await;
        });

        let _ = ready_rx.recv().await;

        Self { shutdown_tx: Some(shutdown_tx), server_handle: Some(server_handle) }
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }
    }
}

pub fn parse_host(host: &str) -> IpAddr {
    host.parse().unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)))
}
