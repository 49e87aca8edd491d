//! Sendnet network adapter for autonomous agents.
//!
//! Authenticates a wallet against a sendnet node, then drives the continuous
//! sync loop: auto-join on invite, auto-reply through an injected responder,
//! and friend-request auto-accept. Core semantics (cursor, router, state
//! machine, error taxonomy) live in `agent-core`.

/// Two-step wallet login flow.
pub mod auth;
/// Reaction handlers and the responder capability.
pub mod handlers;
/// Sync loop driver.
pub mod sync;
/// Transport contract and its HTTP implementation.
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use agent_core::{AdapterError, AdapterErrorCategory, Session};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use auth::{SendnetAuth, WalletSigner};
pub use handlers::{ReactionHandlers, Responder};
pub use sync::SyncLoop;
pub use transport::{HttpTransport, Transport, RATE_LIMIT_BACKOFF};

#[derive(Debug)]
struct RunningSyncTask {
    stop: CancellationToken,
    task: JoinHandle<Result<(), AdapterError>>,
}

/// One authenticated adapter instance.
///
/// Owns the session and the transport; at most one sync task runs per
/// instance, and neither session nor cursor is ever shared across instances.
pub struct SendnetClient {
    transport: Arc<HttpTransport>,
    session: Session,
    sync_task: Mutex<Option<RunningSyncTask>>,
}

impl SendnetClient {
    /// Log in with a wallet address and build a ready client.
    pub async fn login(
        base_url: &str,
        address: &str,
        device_id: &str,
        signer: &dyn WalletSigner,
    ) -> Result<Self, AdapterError> {
        let auth = SendnetAuth::new(base_url)?;
        let session = auth.login(address, device_id, signer).await?;
        Self::from_session(base_url, session)
    }

    /// Build a client from an already established session.
    pub fn from_session(base_url: &str, session: Session) -> Result<Self, AdapterError> {
        let transport = Arc::new(HttpTransport::new(base_url, session.clone())?);
        Ok(Self {
            transport,
            session,
            sync_task: Mutex::new(None),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transport(&self) -> Arc<HttpTransport> {
        self.transport.clone()
    }

    /// Spawn the sync loop as a background task.
    pub async fn start_sync(&self, responder: Arc<dyn Responder>) -> Result<(), AdapterError> {
        let mut guard = self.sync_task.lock().await;
        if guard.is_some() {
            return Err(AdapterError::new(
                AdapterErrorCategory::Internal,
                "sync_already_running",
                "sync task is already running",
            ));
        }

        let stop = CancellationToken::new();
        let stop_child = stop.child_token();
        let mut sync_loop = SyncLoop::new(self.transport.clone(), responder, &self.session);
        let task = tokio::spawn(async move { sync_loop.run(&stop_child).await });

        *guard = Some(RunningSyncTask { stop, task });
        Ok(())
    }

    /// Stop the background sync loop and surface its final result.
    pub async fn stop_sync(&self) -> Result<(), AdapterError> {
        let running = {
            let mut guard = self.sync_task.lock().await;
            guard.take()
        };

        let Some(running) = running else {
            return Err(AdapterError::new(
                AdapterErrorCategory::Internal,
                "sync_not_running",
                "sync task is not running",
            ));
        };

        running.stop.cancel();
        running.task.await.map_err(|err| {
            AdapterError::new(
                AdapterErrorCategory::Internal,
                "sync_task_panicked",
                err.to_string(),
            )
        })?
    }
}
