use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, AdapterErrorCategory};

/// Authenticated session produced by the wallet login flow.
///
/// Immutable once created and exclusively owned by one adapter instance; a
/// process restart always re-authenticates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer credential supplied on every transport call.
    pub access_token: String,
    /// Account identifier used for self-echo suppression.
    pub account_id: String,
}

impl Session {
    /// Build a session, rejecting empty credentials.
    ///
    /// An invalid session is a precondition failure for starting the sync
    /// loop, so the check happens at construction rather than at first use.
    pub fn new(
        access_token: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Result<Self, AdapterError> {
        let access_token = access_token.into();
        let account_id = account_id.into();
        if access_token.trim().is_empty() || account_id.trim().is_empty() {
            return Err(AdapterError::new(
                AdapterErrorCategory::Auth,
                "session_invalid",
                "login did not produce an access token and account id",
            ));
        }
        Ok(Self {
            access_token,
            account_id,
        })
    }
}

/// Pairwise relation request, ephemeral per sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FriendRequest {
    /// Server-issued request id used by the accept endpoint.
    pub id: String,
}

/// Room membership transition carried by an `m.room.member` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Invite,
    Join,
    Leave,
    /// Any other membership value; logged and otherwise ignored.
    Other(String),
}

impl Membership {
    pub fn parse(value: &str) -> Self {
        match value {
            "invite" => Self::Invite,
            "join" => Self::Join,
            "leave" => Self::Leave,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Discriminated room-event payload produced by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEventContent {
    /// `m.room.member` state transition.
    Membership { membership: Membership },
    /// `m.room.create`; acknowledged but not acted on.
    RoomCreate,
    /// `m.room.message` with its message kind and text body.
    Message { msgtype: String, body: String },
    /// `m.room.encrypted`; decryption is out of scope, skipped.
    Encrypted,
    /// Unknown event type; protocol evolution must not break the loop.
    Other { event_type: String },
}

/// One flattened room event in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomEvent {
    pub room_id: String,
    pub sender: String,
    pub content: RoomEventContent,
}

/// Raw room event as it appears in the sync feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawRoomEvent {
    /// Wire event type, for example `m.room.message`.
    #[serde(rename = "type", default)]
    pub event_type: String,
    /// Sender account id.
    #[serde(default)]
    pub sender: String,
    /// Type-specific payload, untyped on the wire.
    #[serde(default)]
    pub content: serde_json::Value,
}

/// State or timeline event list for one room.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EventBlock {
    #[serde(default)]
    pub events: Vec<RawRoomEvent>,
}

/// Per-room section of the sync feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct JoinedRoom {
    /// Authoritative room state transitions; dispatched before the timeline.
    #[serde(default)]
    pub state: EventBlock,
    /// Chronological message/event stream.
    #[serde(default)]
    pub timeline: EventBlock,
}

/// `rooms` section of the sync feed.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RoomsSection {
    #[serde(default)]
    pub join: BTreeMap<String, JoinedRoom>,
}

/// Friend request entry from the dedicated sync-feed field.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct FriendRequestEntry {
    #[serde(default)]
    pub id: String,
}

/// Full incremental sync response body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SyncResponse {
    #[serde(default)]
    pub rooms: RoomsSection,
    #[serde(default)]
    pub friend_request: BTreeMap<String, FriendRequestEntry>,
    /// Continuation token to resume from.
    #[serde(default)]
    pub next_batch: String,
}

/// One fetched sync batch; consumed once per cycle, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncBatch {
    pub response: SyncResponse,
    pub next_token: String,
}

/// Outgoing `m.room.message` body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TextMessagePayload {
    pub msgtype: String,
    pub body: String,
    pub format: String,
    pub formatted_body: String,
}

impl TextMessagePayload {
    /// Plain-text message sent with the HTML format envelope the node expects.
    pub fn text(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            msgtype: "m.text".to_owned(),
            formatted_body: body.clone(),
            body,
            format: "org.matrix.custom.html".to_owned(),
        }
    }
}
