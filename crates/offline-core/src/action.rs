//! Queued mutation record.
//!
//! A `PendingAction` wraps an application-defined payload with the metadata
//! the coordinator needs to replay it in order: a stable id, the time it was
//! enqueued, and the outcome of previous replay attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: Uuid,
    /// Opaque mutation descriptor. The coordinator never inspects it.
    pub payload: serde_json::Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed replay attempts so far.
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingAction {
    /// Create a fresh action stamped with the current time.
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Record a failed replay attempt.
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.attempts += 1;
        self.last_error = Some(reason.into());
    }
}
