//! Connectivity monitors.
//!
//! A monitor broadcasts a [`ConnectivityState`] on every change it observes.
//! Drivers are allowed to repeat themselves; the coordinator de-duplicates by
//! comparing the previous and new combined state.

use std::time::Duration;

use tokio::net::{lookup_host, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::config::ProbeConfig;
use crate::connectivity::ConnectivityState;

const CHANNEL_CAPACITY: usize = 64;

pub trait ConnectivityMonitor: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityState>;
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Owns a background task fed by a monitor. Dropping it aborts the task, so
/// the subscription is released on every exit path.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }

    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// ---------------------------------------------------------------------------
// ManualMonitor
// ---------------------------------------------------------------------------

/// Monitor driven by the embedding application, e.g. from a platform
/// network callback. Also the monitor used in tests.
pub struct ManualMonitor {
    tx: broadcast::Sender<ConnectivityState>,
}

impl Default for ManualMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualMonitor {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Broadcast `state` to all subscribers. Returns how many received it.
    pub fn publish(&self, state: ConnectivityState) -> usize {
        self.tx.send(state).unwrap_or(0)
    }
}

impl ConnectivityMonitor for ManualMonitor {
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// ProbeMonitor
// ---------------------------------------------------------------------------

/// Polls a TCP endpoint and broadcasts the result on every poll.
///
/// `is_online` means the probe host resolved; `is_reachable` means a TCP
/// connection to it was accepted within the timeout.
pub struct ProbeMonitor {
    tx: broadcast::Sender<ConnectivityState>,
    _poller: Subscription,
}

impl ProbeMonitor {
    /// Start polling. Must be called inside a Tokio runtime.
    pub fn spawn(config: ProbeConfig) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let poll_tx = tx.clone();
        let interval = config.interval().max(Duration::from_millis(10));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let state = probe_once(&config).await;
                trace!(?state, "connectivity probe");
                // No subscribers yet is fine; keep polling.
                let _ = poll_tx.send(state);
            }
        });
        Self {
            tx,
            _poller: Subscription::new(handle),
        }
    }
}

impl ConnectivityMonitor for ProbeMonitor {
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

/// Run a single probe against `config.host:config.port`.
pub async fn probe_once(config: &ProbeConfig) -> ConnectivityState {
    let target = format!("{}:{}", config.host, config.port);
    let deadline = config.timeout();

    let addrs: Vec<_> = match timeout(deadline, lookup_host(target.as_str())).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(e)) => {
            debug!(target = %target, error = %e, "probe host did not resolve");
            return ConnectivityState::OFFLINE;
        }
        Err(_) => {
            debug!(target = %target, "probe resolution timed out");
            return ConnectivityState::OFFLINE;
        }
    };
    if addrs.is_empty() {
        return ConnectivityState::OFFLINE;
    }

    for addr in addrs {
        if let Ok(Ok(_stream)) = timeout(deadline, TcpStream::connect(addr)).await {
            return ConnectivityState::READY;
        }
    }
    debug!(target = %target, "probe host resolved but refused connection");
    ConnectivityState::new(true, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn probe_for(port: u16) -> ProbeConfig {
        ProbeConfig {
            host: "127.0.0.1".into(),
            port,
            interval_ms: 20,
            timeout_ms: 500,
        }
    }

    #[tokio::test]
    async fn manual_monitor_delivers_to_every_subscriber() {
        let monitor = ManualMonitor::new();
        let mut a = monitor.subscribe();
        let mut b = monitor.subscribe();
        assert_eq!(monitor.publish(ConnectivityState::READY), 2);
        assert_eq!(a.recv().await.unwrap(), ConnectivityState::READY);
        assert_eq!(b.recv().await.unwrap(), ConnectivityState::READY);
    }

    #[test]
    fn manual_monitor_publish_without_subscribers_is_zero() {
        let monitor = ManualMonitor::new();
        assert_eq!(monitor.publish(ConnectivityState::OFFLINE), 0);
    }

    #[tokio::test]
    async fn probe_once_ready_when_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = probe_once(&probe_for(port)).await;
        assert_eq!(state, ConnectivityState::READY);
    }

    #[tokio::test]
    async fn probe_once_online_but_unreachable_when_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let state = probe_once(&probe_for(port)).await;
        assert_eq!(state, ConnectivityState::new(true, false));
    }

    #[tokio::test]
    async fn probe_once_offline_when_host_does_not_resolve() {
        let cfg = ProbeConfig {
            host: "no-such-host.invalid".into(),
            ..probe_for(443)
        };
        assert_eq!(probe_once(&cfg).await, ConnectivityState::OFFLINE);
    }

    #[tokio::test]
    async fn probe_monitor_emits_repeatedly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let monitor = ProbeMonitor::spawn(probe_for(port));
        let mut rx = monitor.subscribe();
        for _ in 0..2 {
            let state = timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(state.is_ready());
        }
    }

    #[tokio::test]
    async fn dropping_subscription_aborts_task() {
        struct DropSignal(Option<tokio::sync::oneshot::Sender<()>>);
        impl Drop for DropSignal {
            fn drop(&mut self) {
                if let Some(tx) = self.0.take() {
                    let _ = tx.send(());
                }
            }
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let signal = DropSignal(Some(tx));
        let handle = tokio::spawn(async move {
            let _signal = signal;
            std::future::pending::<()>().await;
        });
        let sub = Subscription::new(handle);
        assert!(sub.is_active());
        drop(sub);
        timeout(Duration::from_secs(1), rx).await.unwrap().unwrap();
    }
}
