//! Core contract for the sendnet agent adapter.
//!
//! This crate defines the error taxonomy, the sync cursor and its fetch
//! parameters, the discriminated room-event model, the batch router, and the
//! sync-loop lifecycle state machine. It carries no I/O; the HTTP transport
//! and the loop driver live in `agent-sendnet`.

/// Sync continuation cursor and long-poll fetch parameters.
pub mod cursor;
/// Stable adapter error types and HTTP classification helpers.
pub mod error;
/// Batch expansion: friend requests first, room state before timeline.
pub mod router;
/// Sync loop lifecycle state machine.
pub mod state_machine;
/// Session, room-event, and wire types for the sync feed.
pub mod types;

pub use cursor::{SyncCursor, SyncParams, LONG_POLL_TIMEOUT_MS};
pub use error::{classify_http_status, AdapterError, AdapterErrorCategory};
pub use router::{route_batch, RoutedBatch};
pub use state_machine::{SyncLoopState, SyncLoopStateMachine};
pub use types::{
    EventBlock, FriendRequest, FriendRequestEntry, JoinedRoom, Membership, RawRoomEvent,
    RoomEvent, RoomEventContent, RoomsSection, Session, SyncBatch, SyncResponse,
    TextMessagePayload,
};
