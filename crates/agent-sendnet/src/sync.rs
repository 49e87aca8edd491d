use std::sync::Arc;
use std::time::Duration;

use agent_core::{
    route_batch, AdapterError, Session, SyncCursor, SyncLoopState, SyncLoopStateMachine,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handlers::{ReactionHandlers, Responder};
use crate::transport::{Transport, RATE_LIMIT_BACKOFF};

/// Continuous synchronization loop.
///
/// Owns the cursor and the lifecycle state machine, pulls one batch per
/// cycle, dispatches it through the reaction handlers, and advances the
/// cursor only once dispatch has completed. It never terminates on its own
/// except through an unrecoverable fetch failure; stopping is the
/// cancellation token's job.
pub struct SyncLoop {
    transport: Arc<dyn Transport>,
    handlers: ReactionHandlers,
    cursor: SyncCursor,
    machine: SyncLoopStateMachine,
}

impl SyncLoop {
    pub fn new(
        transport: Arc<dyn Transport>,
        responder: Arc<dyn Responder>,
        session: &Session,
    ) -> Self {
        Self {
            handlers: ReactionHandlers::new(
                transport.clone(),
                responder,
                session.account_id.clone(),
            ),
            transport,
            cursor: SyncCursor::empty(),
            machine: SyncLoopStateMachine::default(),
        }
    }

    /// Resume from a previously observed continuation token.
    pub fn with_cursor(mut self, cursor: SyncCursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn cursor(&self) -> &SyncCursor {
        &self.cursor
    }

    pub fn state(&self) -> SyncLoopState {
        self.machine.state()
    }

    /// Run until cancelled or until an unrecoverable transport failure.
    ///
    /// Cancellation is honored between cycles and while a fetch or back-off
    /// sleep is pending; a fetch abandoned this way has produced no side
    /// effects and no cursor movement, so re-delivery on restart is safe.
    /// Processing and cursor advancement are never interrupted.
    pub async fn run(&mut self, stop: &CancellationToken) -> Result<(), AdapterError> {
        loop {
            if stop.is_cancelled() {
                info!("stop requested, sync loop exiting");
                return Ok(());
            }

            self.machine.begin_fetch()?;
            let params = self.cursor.fetch_params();
            debug!(discovery = self.cursor.is_discovery(), "fetching sync batch");

            let fetched = tokio::select! {
                _ = stop.cancelled() => {
                    info!("stop requested during fetch, sync loop exiting");
                    return Ok(());
                }
                result = self.transport.fetch_sync(&params) => result,
            };

            match fetched {
                Ok(batch) => {
                    self.machine.batch_received()?;
                    let routed = route_batch(&batch.response);
                    debug!(
                        friend_requests = routed.friend_requests.len(),
                        events = routed.events.len(),
                        "dispatching batch"
                    );
                    self.handlers.dispatch(&routed).await;
                    self.machine.dispatched()?;

                    // Last step of the cycle: a crash before this line simply
                    // re-delivers the batch (at-least-once).
                    self.cursor.advance(batch.next_token);
                    self.machine.advanced()?;
                }
                Err(err) if err.is_rate_limited() => {
                    self.machine.back_off()?;
                    let delay = err
                        .retry_after_ms
                        .map(Duration::from_millis)
                        .unwrap_or(RATE_LIMIT_BACKOFF);
                    warn!(delay_ms = delay.as_millis() as u64, "sync throttled, backing off");

                    tokio::select! {
                        _ = stop.cancelled() => {
                            info!("stop requested during back-off, sync loop exiting");
                            return Ok(());
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    self.machine.fetch_failed()?;
                    error!(error = %err, "unrecoverable sync failure, loop halting");
                    return Err(err);
                }
            }
        }
    }
}
