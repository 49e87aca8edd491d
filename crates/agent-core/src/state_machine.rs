use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Sync loop lifecycle state.
///
/// The loop has no terminal success state; it cycles `Idle → Fetching →
/// Processing → Advancing → Idle` until cancelled externally or it reaches
/// `Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SyncLoopState {
    /// Between cycles; the only point where cancellation is honored.
    Idle,
    /// A sync fetch is in flight.
    Fetching,
    /// Batch events are being dispatched to the reaction handlers.
    Processing,
    /// Dispatch finished; the cursor is being committed.
    Advancing,
    /// Unrecoverable transport failure; the loop has halted.
    Failed,
}

/// Explicit transition guard for the sync loop.
///
/// Cursor advancement is modeled as its own phase so that "advance strictly
/// after full dispatch" is a checked transition rather than a convention.
#[derive(Debug, Clone)]
pub struct SyncLoopStateMachine {
    state: SyncLoopState,
}

impl Default for SyncLoopStateMachine {
    fn default() -> Self {
        Self {
            state: SyncLoopState::Idle,
        }
    }
}

impl SyncLoopStateMachine {
    pub fn state(&self) -> SyncLoopState {
        self.state
    }

    /// Idle → Fetching.
    pub fn begin_fetch(&mut self) -> Result<(), AdapterError> {
        self.transition_from(SyncLoopState::Idle, SyncLoopState::Fetching, "begin_fetch")
    }

    /// Fetching → Processing, on successful batch retrieval.
    pub fn batch_received(&mut self) -> Result<(), AdapterError> {
        self.transition_from(
            SyncLoopState::Fetching,
            SyncLoopState::Processing,
            "batch_received",
        )
    }

    /// Fetching → Idle, after a rate-limit back-off. No state is lost; the
    /// same cursor is retried.
    pub fn back_off(&mut self) -> Result<(), AdapterError> {
        self.transition_from(SyncLoopState::Fetching, SyncLoopState::Idle, "back_off")
    }

    /// Fetching → Failed, on an unrecoverable transport failure.
    pub fn fetch_failed(&mut self) -> Result<(), AdapterError> {
        self.transition_from(
            SyncLoopState::Fetching,
            SyncLoopState::Failed,
            "fetch_failed",
        )
    }

    /// Processing → Advancing, once every event of the batch has been
    /// dispatched (individual handler outcomes do not matter here).
    pub fn dispatched(&mut self) -> Result<(), AdapterError> {
        self.transition_from(
            SyncLoopState::Processing,
            SyncLoopState::Advancing,
            "dispatched",
        )
    }

    /// Advancing → Idle, after the cursor holds the batch's next token.
    pub fn advanced(&mut self) -> Result<(), AdapterError> {
        self.transition_from(SyncLoopState::Advancing, SyncLoopState::Idle, "advanced")
    }

    fn transition_from(
        &mut self,
        expected: SyncLoopState,
        next: SyncLoopState,
        action: &str,
    ) -> Result<(), AdapterError> {
        if self.state != expected {
            return Err(AdapterError::invalid_state(self.state, action));
        }
        self.state = next;
        Ok(())
    }
}
