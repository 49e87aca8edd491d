use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::state_machine::SyncLoopState;

/// Broad error category used for propagation policy and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorCategory {
    /// Invalid input, unsupported state, or other configuration issue.
    Config,
    /// Login failure or rejected credential; the loop must not start.
    Auth,
    /// Network or transport failure; unrecoverable for a running loop.
    Network,
    /// Throttled by the node; retryable with the same cursor after a delay.
    RateLimited,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal adapter bug or invariant break.
    Internal,
}

/// Stable adapter error payload surfaced to the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct AdapterError {
    /// High-level error category.
    pub category: AdapterErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl AdapterError {
    /// Construct a new adapter error.
    pub fn new(
        category: AdapterErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: SyncLoopState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            AdapterErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while sync loop is in state {current:?}"),
        )
    }

    /// Whether a fetch that produced this error may be retried with the same
    /// cursor after a back-off. Only throttling qualifies; any other fetch
    /// failure halts the loop.
    pub fn is_rate_limited(&self) -> bool {
        self.category == AdapterErrorCategory::RateLimited
    }
}

/// Map HTTP status codes to adapter error categories.
pub fn classify_http_status(status: u16) -> AdapterErrorCategory {
    match status {
        401 | 403 => AdapterErrorCategory::Auth,
        408 | 429 => AdapterErrorCategory::RateLimited,
        400..=499 => AdapterErrorCategory::Config,
        500..=599 => AdapterErrorCategory::Network,
        _ => AdapterErrorCategory::Internal,
    }
}
