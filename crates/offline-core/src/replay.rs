//! Replay handlers: what "applying" a pending action means.
//!
//! The coordinator only cares whether a replay succeeded. Retrying the
//! underlying mutation, idempotency keys and conflict handling belong to the
//! handler.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::action::PendingAction;
use crate::error::SyncError;

/// Whole-request deadline for [`HttpReplay::new`].
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReplayError(pub String);

impl ReplayError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[async_trait]
pub trait ReplayHandler: Send + Sync {
    async fn replay(&self, action: &PendingAction) -> Result<(), ReplayError>;
}

// ---------------------------------------------------------------------------
// FnReplay
// ---------------------------------------------------------------------------

/// Adapts an async closure into a [`ReplayHandler`].
///
/// ```rust,ignore
/// let handler = FnReplay::new(|action: PendingAction| async move {
///     api.apply(action.payload).await.map_err(|e| ReplayError::new(e.to_string()))
/// });
/// ```
pub struct FnReplay<F> {
    f: F,
}

impl<F, Fut> FnReplay<F>
where
    F: Fn(PendingAction) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ReplayError>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ReplayHandler for FnReplay<F>
where
    F: Fn(PendingAction) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), ReplayError>> + Send + 'static,
{
    async fn replay(&self, action: &PendingAction) -> Result<(), ReplayError> {
        (self.f)(action.clone()).await
    }
}

// ---------------------------------------------------------------------------
// HttpReplay
// ---------------------------------------------------------------------------

/// POSTs each payload as JSON to a fixed endpoint.
///
/// The action id travels in `X-Action-Id` so the receiving side can
/// de-duplicate a replay that succeeded upstream but was not checkpointed.
#[derive(Clone)]
pub struct HttpReplay {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpReplay {
    pub fn new(endpoint: impl Into<String>) -> crate::Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_HTTP_TIMEOUT)
    }

    /// A stalled endpoint fails the replay after `timeout` instead of
    /// holding the sync open.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("offline/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(endpoint, http))
    }

    pub fn with_client(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReplayHandler for HttpReplay {
    async fn replay(&self, action: &PendingAction) -> Result<(), ReplayError> {
        debug!(id = %action.id, endpoint = %self.endpoint, "replaying action over http");

        let response = self
            .http
            .post(&self.endpoint)
            .header("X-Action-Id", action.id.to_string())
            .header("X-Enqueued-At", action.enqueued_at.to_rfc3339())
            .json(&action.payload)
            .send()
            .await
            .map_err(|e| ReplayError::new(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ReplayError::new(format!("HTTP {status}: {body}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn fn_replay_passes_payload_through() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler = FnReplay::new(move |action: PendingAction| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(action.payload["n"].as_u64().unwrap() as usize, Ordering::SeqCst);
                Ok(())
            }
        });
        handler
            .replay(&PendingAction::new(json!({"n": 3})))
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fn_replay_surfaces_failure() {
        let handler = FnReplay::new(|_a: PendingAction| async { Err(ReplayError::new("boom")) });
        let err = handler
            .replay(&PendingAction::new(json!(null)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn http_replay_posts_payload_with_action_id() {
        let mut server = mockito::Server::new_async().await;
        let action = PendingAction::new(json!({"op": "complete_step", "step": 1}));
        let mock = server
            .mock("POST", "/actions")
            .match_header("x-action-id", action.id.to_string().as_str())
            .match_body(mockito::Matcher::Json(json!({"op": "complete_step", "step": 1})))
            .with_status(204)
            .create_async()
            .await;

        let handler = HttpReplay::new(format!("{}/actions", server.url())).unwrap();
        handler.replay(&action).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_replay_non_success_status_is_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/actions")
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let handler = HttpReplay::new(format!("{}/actions", server.url())).unwrap();
        let err = handler
            .replay(&PendingAction::new(json!({})))
            .await
            .unwrap_err();
        assert!(err.0.contains("503"), "got: {err}");
        assert!(err.0.contains("maintenance"), "got: {err}");
    }

    #[tokio::test]
    async fn http_replay_connection_refused_is_failure() {
        // Port 9 (discard) on localhost is almost never listening.
        let handler = HttpReplay::new("http://127.0.0.1:9/actions").unwrap();
        let err = handler
            .replay(&PendingAction::new(json!({})))
            .await
            .unwrap_err();
        assert!(err.0.contains("network error"), "got: {err}");
    }

    #[tokio::test]
    async fn http_replay_stalled_endpoint_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let handler =
            HttpReplay::with_timeout(format!("http://{addr}/actions"), Duration::from_millis(200))
                .unwrap();
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            handler.replay(&PendingAction::new(json!({}))),
        )
        .await
        .expect("client timeout should fire first")
        .unwrap_err();
        assert!(err.0.contains("network error"), "got: {err}");
    }
}
