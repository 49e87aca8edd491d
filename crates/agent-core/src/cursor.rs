/// Bounded long-poll wait for incremental fetches, in milliseconds.
///
/// An unbounded wait would starve cancellation checks, so the node is always
/// asked to return within this window.
pub const LONG_POLL_TIMEOUT_MS: u64 = 30_000;

/// Continuation cursor for the sync feed.
///
/// Empty means "no history yet" and selects a zero-timeout discovery fetch.
/// The cursor is advanced only after a batch has been fully dispatched, so a
/// crash mid-cycle re-delivers the same batch on restart (at-least-once).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncCursor {
    token: Option<String>,
}

impl SyncCursor {
    /// Cursor with no history; the first fetch runs in discovery mode.
    pub fn empty() -> Self {
        Self { token: None }
    }

    /// Cursor resuming from a server-issued continuation token.
    ///
    /// An empty or blank token is treated the same as no history.
    pub fn at(token: impl Into<String>) -> Self {
        let token = token.into();
        if token.trim().is_empty() {
            Self::empty()
        } else {
            Self { token: Some(token) }
        }
    }

    /// Current continuation token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether the next fetch is a discovery handshake rather than a long-poll.
    pub fn is_discovery(&self) -> bool {
        self.token.is_none()
    }

    /// Fetch parameters for the next sync request.
    pub fn fetch_params(&self) -> SyncParams {
        match &self.token {
            None => SyncParams {
                timeout_ms: 0,
                since: None,
                dry_run: true,
            },
            Some(token) => SyncParams {
                timeout_ms: LONG_POLL_TIMEOUT_MS,
                since: Some(token.clone()),
                dry_run: false,
            },
        }
    }

    /// Advance to the continuation token of a fully dispatched batch.
    ///
    /// Must be the last step of a processing cycle.
    pub fn advance(&mut self, next_token: impl Into<String>) {
        let next_token = next_token.into();
        self.token = if next_token.trim().is_empty() {
            None
        } else {
            Some(next_token)
        };
    }
}

/// Query parameters for one sync fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncParams {
    /// Long-poll wait in milliseconds; zero for discovery.
    pub timeout_ms: u64,
    /// Continuation token to resume from, absent on discovery.
    pub since: Option<String>,
    /// Discovery handshake marker.
    pub dry_run: bool,
}

impl SyncParams {
    /// Render the query string exactly as the node expects it.
    pub fn query_string(&self) -> String {
        let mut query = format!("timeout={}", self.timeout_ms);
        if let Some(since) = &self.since {
            query.push_str("&since=");
            query.push_str(since);
        }
        if self.dry_run {
            query.push_str("&dry-run=true");
        }
        query
    }
}
