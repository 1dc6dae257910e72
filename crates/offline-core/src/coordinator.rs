//! Offline sync coordinator.
//!
//! Owns the in-memory queue of [`PendingAction`]s and is the only writer of
//! its key in the durable store. Every mutation of the queue is persisted
//! before the in-memory copy changes, so the two never diverge once a call
//! returns.
//!
//! # Lifecycle
//!
//! ```text
//! new()  ── hydrate queue from store (malformed → empty)
//! start() ── subscribe to monitor, spawn listener
//!   on_connectivity(): not-ready → ready ⇒ spawn one sync()
//! stop() / drop ── abort listener
//! ```
//!
//! # Sync
//!
//! `sync()` replays the queue head-first, one action at a time. Each success
//! is checkpointed (removed and persisted) before the next replay starts. The
//! first failure stops the run and leaves the failed action at the head, so
//! later actions are never applied ahead of the ones they depend on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::PendingAction;
use crate::codec;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityState;
use crate::error::{Result, SyncError};
use crate::monitor::{ConnectivityMonitor, Subscription};
use crate::replay::{ReplayError, ReplayHandler};
use crate::store::KeyValueStore;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// SyncReport / SyncStats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Offline, or online without internet reachability.
    NotReady,
    EmptyQueue,
}

/// Outcome of a `sync()` call that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub replayed: usize,
    pub remaining: usize,
    /// Set when preconditions failed and nothing was attempted.
    pub skipped: Option<SkipReason>,
    /// Connectivity dropped mid-run; the rest stays queued.
    pub interrupted: bool,
}

impl SyncReport {
    fn skipped(reason: SkipReason, remaining: usize) -> Self {
        Self {
            replayed: 0,
            remaining,
            skipped: Some(reason),
            interrupted: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Syncs that passed their preconditions and replayed at least one action
    /// or failed trying.
    pub syncs_run: u64,
    pub last_sync_replayed: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// `None` when the last run succeeded.
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// SyncCoordinator
// ---------------------------------------------------------------------------

pub struct SyncCoordinator {
    inner: Arc<Inner>,
    listener: Mutex<Option<Subscription>>,
}

struct Inner {
    store: Arc<dyn KeyValueStore>,
    handler: Arc<dyn ReplayHandler>,
    storage_key: String,
    replay_timeout: Option<Duration>,
    queue: Mutex<Vec<PendingAction>>,
    connectivity: Mutex<ConnectivityState>,
    stats: Mutex<SyncStats>,
    /// Held for the whole of a sync run.
    sync_guard: tokio::sync::Mutex<()>,
}

impl SyncCoordinator {
    /// Build a coordinator and hydrate its queue from `store`.
    ///
    /// Absent or malformed persisted content yields an empty queue. A failing
    /// store read is returned as an error.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        handler: Arc<dyn ReplayHandler>,
        config: &SyncConfig,
    ) -> Result<Self> {
        if config.storage_key.trim().is_empty() {
            return Err(SyncError::Config("storage_key must not be empty".into()));
        }
        let queue = match store.get(&config.storage_key)? {
            Some(raw) => codec::decode_or_empty(&raw),
            None => Vec::new(),
        };
        debug!(
            key = %config.storage_key,
            pending = queue.len(),
            "hydrated offline queue"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                handler,
                storage_key: config.storage_key.clone(),
                replay_timeout: config.replay_timeout(),
                queue: Mutex::new(queue),
                connectivity: Mutex::new(ConnectivityState::OFFLINE),
                stats: Mutex::new(SyncStats::default()),
                sync_guard: tokio::sync::Mutex::new(()),
            }),
            listener: Mutex::new(None),
        })
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Subscribe to `monitor` and react to its events until `stop()`.
    ///
    /// Calling `start` while already started is a no-op. Must run inside a
    /// Tokio runtime.
    pub fn start(&self, monitor: &dyn ConnectivityMonitor) -> Result<()> {
        let mut listener = lock(&self.listener);
        if listener.is_some() {
            return Ok(());
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SyncError::NoRuntime);
        }

        let mut rx = monitor.subscribe();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(state) => {
                        // Detached: the spawned sync logs its own outcome.
                        let _ = inner.on_connectivity(state);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "connectivity listener lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("connectivity monitor closed");
                        break;
                    }
                }
            }
        });
        *listener = Some(Subscription::new(handle));
        debug!("coordinator started");
        Ok(())
    }

    /// Release the monitor subscription. Returns whether one was active.
    pub fn stop(&self) -> bool {
        let stopped = lock(&self.listener).take().is_some();
        if stopped {
            debug!("coordinator stopped");
        }
        stopped
    }

    pub fn is_started(&self) -> bool {
        lock(&self.listener)
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    // -----------------------------------------------------------------------
    // Read-only surface
    // -----------------------------------------------------------------------

    pub fn connectivity(&self) -> ConnectivityState {
        self.inner.connectivity()
    }

    pub fn is_online(&self) -> bool {
        self.connectivity().is_online
    }

    pub fn is_reachable(&self) -> bool {
        self.connectivity().is_reachable
    }

    /// Snapshot of the queue, oldest first.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        lock(&self.inner.queue).clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    pub fn stats(&self) -> SyncStats {
        lock(&self.inner.stats).clone()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append `payload` to the queue and persist before returning.
    ///
    /// On a store error the queue is left as it was and the error is
    /// returned; the action is not queued.
    pub fn queue_action(&self, payload: serde_json::Value) -> Result<PendingAction> {
        let action = PendingAction::new(payload);
        let mut queue = lock(&self.inner.queue);
        queue.push(action.clone());
        if let Err(e) = self.inner.persist(&queue) {
            queue.pop();
            warn!(error = %e, "failed to persist queued action");
            return Err(e);
        }
        debug!(id = %action.id, pending = queue.len(), "queued action");
        Ok(action)
    }

    /// Replay pending actions in order. See the module docs.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.inner.sync().await
    }

    /// Record a connectivity event.
    ///
    /// On a not-ready → ready transition a sync is spawned and its handle
    /// returned; dropping the handle detaches it. Repeated ready events, or
    /// events delivered outside a Tokio runtime, return `None`.
    pub fn on_connectivity(
        &self,
        state: ConnectivityState,
    ) -> Option<JoinHandle<Result<SyncReport>>> {
        self.inner.on_connectivity(state)
    }
}

// ---------------------------------------------------------------------------
// Inner
// ---------------------------------------------------------------------------

impl Inner {
    fn connectivity(&self) -> ConnectivityState {
        *lock(&self.connectivity)
    }

    fn pending_count(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Write `actions` under the storage key, deleting it when empty.
    fn persist(&self, actions: &[PendingAction]) -> Result<()> {
        if actions.is_empty() {
            self.store.delete(&self.storage_key)
        } else {
            let raw = codec::encode_queue(actions)?;
            self.store.set(&self.storage_key, &raw)
        }
    }

    fn on_connectivity(
        self: &Arc<Self>,
        state: ConnectivityState,
    ) -> Option<JoinHandle<Result<SyncReport>>> {
        let previous = std::mem::replace(&mut *lock(&self.connectivity), state);
        if previous != state {
            debug!(?previous, ?state, "connectivity changed");
        }
        if !previous.becomes_ready(&state) {
            return None;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            warn!("connectivity restored outside a runtime; automatic sync skipped");
            return None;
        }

        info!(pending = self.pending_count(), "connectivity restored, syncing");
        let inner = Arc::clone(self);
        Some(tokio::spawn(async move {
            let result = inner.sync().await;
            match &result {
                Ok(report) => debug!(?report, "automatic sync finished"),
                Err(e) => warn!(error = %e, "automatic sync failed"),
            }
            result
        }))
    }

    async fn sync(&self) -> Result<SyncReport> {
        // A second caller waits here, then re-checks preconditions against
        // whatever the first run left behind.
        let _running = self.sync_guard.lock().await;

        if !self.connectivity().is_ready() {
            return Ok(SyncReport::skipped(SkipReason::NotReady, self.pending_count()));
        }
        if self.pending_count() == 0 {
            return Ok(SyncReport::skipped(SkipReason::EmptyQueue, 0));
        }

        let started_at = Utc::now();
        let mut replayed = 0usize;
        let outcome = loop {
            if !self.connectivity().is_ready() {
                info!(replayed, "connectivity lost mid-sync, stopping");
                break Ok(true);
            }
            let head = lock(&self.queue).first().cloned();
            let Some(action) = head else {
                break Ok(false);
            };

            match self.replay_one(&action).await {
                Ok(()) => {
                    if let Err(e) = self.checkpoint(&action) {
                        break Err(e);
                    }
                    replayed += 1;
                    debug!(id = %action.id, "replayed action");
                }
                Err(reason) => {
                    self.record_failure(&action, &reason);
                    warn!(id = %action.id, error = %reason, replayed, "replay failed, halting sync");
                    break Err(SyncError::Replay {
                        id: action.id,
                        replayed,
                        reason: reason.to_string(),
                    });
                }
            }
        };

        {
            let mut stats = lock(&self.stats);
            stats.syncs_run += 1;
            stats.last_sync_replayed = replayed;
            stats.last_sync_at = Some(started_at);
            stats.last_error = outcome.as_ref().err().map(|e| e.to_string());
        }

        let interrupted = outcome?;
        let remaining = self.pending_count();
        info!(replayed, remaining, interrupted, "sync finished");
        Ok(SyncReport {
            replayed,
            remaining,
            skipped: None,
            interrupted,
        })
    }

    async fn replay_one(&self, action: &PendingAction) -> std::result::Result<(), ReplayError> {
        match self.replay_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.handler.replay(action)).await {
                Ok(result) => result,
                Err(_) => Err(ReplayError::new(format!(
                    "replay timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => self.handler.replay(action).await,
        }
    }

    /// Drop the replayed head of the queue, persisting first.
    fn checkpoint(&self, replayed: &PendingAction) -> Result<()> {
        let mut queue = lock(&self.queue);
        // Only a sync removes from the front, and syncs are serialised.
        debug_assert_eq!(queue.first().map(|a| a.id), Some(replayed.id));
        self.persist(&queue[1..])?;
        queue.remove(0);
        Ok(())
    }

    /// Note the failure on the head action. A store error here is logged and
    /// the queue is left untouched.
    fn record_failure(&self, failed: &PendingAction, reason: &ReplayError) {
        let mut queue = lock(&self.queue);
        let Some(head) = queue.first_mut() else {
            return;
        };
        if head.id != failed.id {
            return;
        }
        let before = head.clone();
        head.record_failure(reason.to_string());
        if let Err(e) = self.persist(&queue) {
            warn!(error = %e, "failed to persist replay failure");
            queue[0] = before;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
