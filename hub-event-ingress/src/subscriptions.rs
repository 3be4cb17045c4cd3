//! Tracks active SIDs and renews them in the background at 2/3 of their
//! timeout, per spec.md §4.4. Grounded on the renewal-loop shape of
//! `RenewalManager` (spawn + `tokio::select!` + bounded shutdown).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hub_api::{PlayerActions, Service};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;

#[derive(Debug, Clone)]
struct ActiveSubscription {
    ip: String,
    service: Service,
    timeout_seconds: u32,
    renew_at: DateTime<Utc>,
}

impl ActiveSubscription {
    /// Renewal fires at 2/3 of the subscription timeout, per spec.md §4.4.
    fn renew_at_for(timeout_seconds: u32, from: DateTime<Utc>) -> DateTime<Utc> {
        from + chrono::Duration::seconds((timeout_seconds as i64 * 2) / 3)
    }
}

/// Active SID → (ip, service) registry plus a background renewal task.
pub struct SubscriptionRegistry {
    subs: Arc<RwLock<HashMap<String, ActiveSubscription>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionRegistry {
    pub fn start(actions: PlayerActions, check_interval: Duration) -> Self {
        let subs: Arc<RwLock<HashMap<String, ActiveSubscription>>> =
            Arc::new(RwLock::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(Self::renewal_task(
            subs.clone(),
            actions,
            check_interval,
            shutdown_rx,
        ));

        Self {
            subs,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub async fn register(&self, sid: String, ip: String, service: Service, timeout_seconds: u32) {
        let now = Utc::now();
        self.subs.write().await.insert(
            sid,
            ActiveSubscription {
                ip,
                service,
                timeout_seconds,
                renew_at: ActiveSubscription::renew_at_for(timeout_seconds, now),
            },
        );
    }

    pub async fn is_registered(&self, sid: &str) -> bool {
        self.subs.read().await.contains_key(sid)
    }

    pub async fn unregister(&self, sid: &str) {
        self.subs.write().await.remove(sid);
    }

    /// The IP a SID was registered against — a synchronous, best-effort
    /// lookup for `SidResolver` implementations, which run outside the
    /// `async` call chain. Returns `None` if the lock is momentarily
    /// held by a writer rather than blocking the caller.
    pub fn ip_for_sid(&self, sid: &str) -> Option<String> {
        self.subs.try_read().ok()?.get(sid).map(|s| s.ip.clone())
    }

    async fn renewal_task(
        subs: Arc<RwLock<HashMap<String, ActiveSubscription>>>,
        actions: PlayerActions,
        check_interval: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let mut ticker = interval(check_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    Self::renew_due_subscriptions(&subs, &actions).await;
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    }

    async fn renew_due_subscriptions(
        subs: &Arc<RwLock<HashMap<String, ActiveSubscription>>>,
        actions: &PlayerActions,
    ) {
        let now = Utc::now();
        let due: Vec<(String, ActiveSubscription)> = {
            let guard = subs.read().await;
            guard
                .iter()
                .filter(|(_, sub)| sub.renew_at <= now)
                .map(|(sid, sub)| (sid.clone(), sub.clone()))
                .collect()
        };

        for (sid, sub) in due {
            match actions
                .renew_subscription(&sub.ip, sub.service, &sid, sub.timeout_seconds)
                .await
            {
                Ok(handle) => {
                    let mut guard = subs.write().await;
                    if let Some(entry) = guard.get_mut(&sid) {
                        entry.timeout_seconds = handle.timeout_seconds;
                        entry.renew_at = ActiveSubscription::renew_at_for(handle.timeout_seconds, Utc::now());
                    }
                }
                Err(err) => {
                    tracing::warn!(sid = %sid, ip = %sub.ip, error = %err, "subscription renewal failed");
                }
            }
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(task) = self.task.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
        }
    }
}
