use std::sync::Arc;

use agent_core::{Membership, RoomEvent, RoomEventContent, RoutedBatch};
use tracing::{debug, info, warn};

use crate::transport::Transport;

/// Injected response-generation capability.
///
/// Pure mapping from an incoming text plus context to an outgoing text; an
/// empty return suppresses the reply. The embedding agent runtime owns any
/// memory or generation pipeline behind this.
pub trait Responder: Send + Sync {
    fn respond(&self, message: &str, room_id: &str, sender_id: &str) -> String;
}

/// Side-effecting reactions driven by routed sync events.
///
/// Each reaction runs synchronously within the cycle. Transport failures are
/// caught and logged here so one bad event never stalls the rest of the
/// batch; only the fetch itself may halt the loop.
pub struct ReactionHandlers {
    transport: Arc<dyn Transport>,
    responder: Arc<dyn Responder>,
    account_id: String,
}

impl ReactionHandlers {
    pub fn new(
        transport: Arc<dyn Transport>,
        responder: Arc<dyn Responder>,
        account_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            responder,
            account_id: account_id.into(),
        }
    }

    /// Dispatch one routed batch: friend requests first, then room events.
    pub async fn dispatch(&self, routed: &RoutedBatch) {
        for request in &routed.friend_requests {
            self.accept_friend_request(&request.id).await;
        }
        for event in &routed.events {
            self.handle_event(event).await;
        }
    }

    async fn accept_friend_request(&self, request_id: &str) {
        match self.transport.accept_friend_request(request_id).await {
            Ok(()) => info!(request_id, "friend request accepted"),
            Err(err) => warn!(request_id, error = %err, "failed to accept friend request"),
        }
    }

    async fn handle_event(&self, event: &RoomEvent) {
        match &event.content {
            RoomEventContent::Membership { membership } => {
                self.handle_membership(event, membership).await;
            }
            RoomEventContent::Message { msgtype, body } => {
                self.handle_message(event, msgtype, body).await;
            }
            RoomEventContent::RoomCreate => {
                debug!(room_id = %event.room_id, "room created");
            }
            RoomEventContent::Encrypted => {
                debug!(room_id = %event.room_id, "encrypted event skipped");
            }
            RoomEventContent::Other { event_type } => {
                debug!(room_id = %event.room_id, event_type, "event type skipped");
            }
        }
    }

    /// Membership reactions. Self-events are intentionally not filtered here:
    /// the invite naming this account as the target is the one to act on.
    async fn handle_membership(&self, event: &RoomEvent, membership: &Membership) {
        match membership {
            Membership::Invite => match self.transport.join_room(&event.room_id).await {
                Ok(()) => info!(room_id = %event.room_id, "joined room on invite"),
                Err(err) => {
                    warn!(room_id = %event.room_id, error = %err, "failed to join room")
                }
            },
            Membership::Join => {
                info!(room_id = %event.room_id, sender = %event.sender, "user joined room");
            }
            Membership::Leave => {
                info!(room_id = %event.room_id, sender = %event.sender, "user left room");
            }
            Membership::Other(value) => {
                debug!(room_id = %event.room_id, membership = %value, "membership ignored");
            }
        }
    }

    async fn handle_message(&self, event: &RoomEvent, msgtype: &str, body: &str) {
        // Never react to our own prior output.
        if event.sender == self.account_id {
            debug!(room_id = %event.room_id, "message from self, ignoring");
            return;
        }
        if msgtype != "m.text" {
            debug!(room_id = %event.room_id, msgtype, "non-text message skipped");
            return;
        }

        let reply = self
            .responder
            .respond(body, &event.room_id, &event.sender);
        if reply.is_empty() {
            debug!(room_id = %event.room_id, "responder suppressed reply");
            return;
        }

        match self
            .transport
            .send_text_message(&event.room_id, &reply)
            .await
        {
            Ok(()) => info!(room_id = %event.room_id, "reply sent"),
            Err(err) => warn!(room_id = %event.room_id, error = %err, "failed to send reply"),
        }
    }
}
