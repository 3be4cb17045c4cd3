//! HTTP server combining the UPnP NOTIFY and cloud webhook routes. Port
//! selection, local-IP detection, and the ready-signal handshake are
//! grounded on `callback-server`'s `CallbackServer`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::time::Duration;

use hub_state_cache::StateSink;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use warp::Filter;

use crate::error::{IngressError, Result};
use crate::notify::{notify_route, SidResolver};
use crate::subscriptions::SubscriptionRegistry;
use crate::webhook::{webhook_route, GroupToIpResolver};

pub struct IngressServer {
    port: u16,
    base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<JoinHandle<()>>,
}

impl IngressServer {
    pub async fn start(
        port_range: (u16, u16),
        registry: Arc<SubscriptionRegistry>,
        sid_resolver: Arc<dyn SidResolver>,
        group_resolver: Arc<dyn GroupToIpResolver>,
        sink: Arc<dyn StateSink>,
    ) -> Result<Self> {
        let port = find_available_port(port_range.0, port_range.1)
            .ok_or(IngressError::NoAvailablePort(port_range.0, port_range.1))?;
        let local_ip = detect_local_ip().ok_or(IngressError::LocalIpUnavailable)?;
        let base_url = format!("http://{local_ip}:{port}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let routes = notify_route(registry, sid_resolver, sink.clone())
            .or(webhook_route(group_resolver, sink))
            .with(warp::trace::request());

        let server_handle = tokio::spawn(async move {
            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );
            tracing::info!(%addr, "event ingress server listening");
            let _ = ready_tx.send(()).await;
            server.await;
        });

        ready_rx.recv().await.ok_or(IngressError::LocalIpUnavailable)?;

        Ok(Self {
            port,
            base_url,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
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

fn find_available_port(start: u16, end: u16) -> Option<u16> {
    (start..=end).find(|&port| is_port_available(port))
}

fn is_port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port)).is_ok()
}

fn detect_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    socket.local_addr().ok().map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_an_available_port_in_range() {
        let port = find_available_port(51000, 51100);
        assert!(port.is_some());
        let port = port.unwrap();
        assert!((51000..=51100).contains(&port));
    }

    #[test]
    fn detects_a_non_loopback_local_ip() {
        let ip = detect_local_ip();
        assert!(ip.is_some());
    }
}
