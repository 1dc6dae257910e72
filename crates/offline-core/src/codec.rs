//! Serialisation of the persisted queue.
//!
//! The queue is stored under a single key as a versioned JSON envelope:
//!
//! ```text
//! {"version":1,"actions":[{"id":..,"payload":..,"enqueued_at":..}, ...]}
//! ```
//!
//! A bare JSON array of actions is also accepted on read so queues written
//! before the envelope existed still hydrate. Writes always use the envelope.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::PendingAction;
use crate::error::{Result, SyncError};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    actions: &'a [PendingAction],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Persisted {
    Envelope {
        version: u32,
        actions: Vec<PendingAction>,
    },
    Bare(Vec<PendingAction>),
}

/// Encode the full queue, oldest action first.
pub fn encode_queue(actions: &[PendingAction]) -> Result<String> {
    let env = EnvelopeRef {
        version: FORMAT_VERSION,
        actions,
    };
    Ok(serde_json::to_string(&env)?)
}

/// Decode a persisted queue. Fails on malformed JSON or an unknown version.
pub fn decode_queue(raw: &str) -> Result<Vec<PendingAction>> {
    match serde_json::from_str::<Persisted>(raw)? {
        Persisted::Envelope { version, actions } if version == FORMAT_VERSION => Ok(actions),
        Persisted::Envelope { version, .. } => Err(SyncError::UnsupportedVersion(version)),
        Persisted::Bare(actions) => Ok(actions),
    }
}

/// Decode a persisted queue, treating any malformed content as empty.
///
/// Corruption is recoverable: the next successful write replaces the blob.
pub fn decode_or_empty(raw: &str) -> Vec<PendingAction> {
    match decode_queue(raw) {
        Ok(actions) => actions,
        Err(e) => {
            warn!(error = %e, bytes = raw.len(), "discarding malformed persisted queue");
            Vec::new()
        }
    }
}
