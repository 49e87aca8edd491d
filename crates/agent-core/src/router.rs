use tracing::warn;

use crate::types::{
    FriendRequest, Membership, RawRoomEvent, RoomEvent, RoomEventContent, SyncResponse,
};

/// Routed output of one sync batch, in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedBatch {
    /// Friend requests; processed before room events in the same cycle.
    pub friend_requests: Vec<FriendRequest>,
    /// Flattened room events, per room state strictly before timeline.
    pub events: Vec<RoomEvent>,
}

/// Expand a sync response into an ordered event sequence.
///
/// Friend requests come from their dedicated field first. Rooms are then
/// iterated and, per room, state events are concatenated before timeline
/// events so a room's state transitions apply before its message history for
/// the cycle. Unknown event types are tagged [`RoomEventContent::Other`] and
/// logged; they never fail the batch.
pub fn route_batch(response: &SyncResponse) -> RoutedBatch {
    let friend_requests = response
        .friend_request
        .values()
        .filter(|entry| !entry.id.is_empty())
        .map(|entry| FriendRequest {
            id: entry.id.clone(),
        })
        .collect();

    let mut events = Vec::new();
    for (room_id, room) in &response.rooms.join {
        for raw in &room.state.events {
            events.push(classify_event(room_id, raw));
        }
        for raw in &room.timeline.events {
            events.push(classify_event(room_id, raw));
        }
    }

    RoutedBatch {
        friend_requests,
        events,
    }
}

fn classify_event(room_id: &str, raw: &RawRoomEvent) -> RoomEvent {
    let content = match raw.event_type.as_str() {
        "m.room.member" => {
            let membership = raw
                .content
                .get("membership")
                .and_then(|value| value.as_str())
                .unwrap_or_default();
            RoomEventContent::Membership {
                membership: Membership::parse(membership),
            }
        }
        "m.room.create" => RoomEventContent::RoomCreate,
        "m.room.message" => RoomEventContent::Message {
            msgtype: raw
                .content
                .get("msgtype")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_owned(),
            body: raw
                .content
                .get("body")
                .and_then(|value| value.as_str())
                .unwrap_or_default()
                .to_owned(),
        },
        "m.room.encrypted" => RoomEventContent::Encrypted,
        other => {
            warn!(room_id, event_type = other, "unhandled event type");
            RoomEventContent::Other {
                event_type: other.to_owned(),
            }
        }
    };

    RoomEvent {
        room_id: room_id.to_owned(),
        sender: raw.sender.clone(),
        content,
    }
}
