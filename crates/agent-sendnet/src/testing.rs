//! In-memory test doubles shared by handler and sync-loop tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use agent_core::{AdapterError, AdapterErrorCategory, SyncBatch, SyncParams};
use async_trait::async_trait;

use crate::handlers::Responder;
use crate::transport::Transport;

/// One recorded transport interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchSync(SyncParams),
    JoinRoom(String),
    LeaveRoom(String),
    AcceptFriendRequest(String),
    SendMessage { room_id: String, body: String },
}

/// Scripted transport recording every call.
///
/// Fetch results are served from a queue; an exhausted queue yields a
/// transport failure so loop tests terminate deterministically.
#[derive(Default)]
pub struct MockTransport {
    fetch_script: Mutex<VecDeque<Result<SyncBatch, AdapterError>>>,
    calls: Mutex<Vec<Call>>,
    fail_next_side_effect: Mutex<bool>,
}

impl MockTransport {
    pub fn push_fetch(&self, result: Result<SyncBatch, AdapterError>) {
        self.fetch_script
            .lock()
            .expect("fetch script lock")
            .push_back(result);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// `since` parameters of every fetch, in order.
    pub fn fetch_since_history(&self) -> Vec<Option<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FetchSync(params) => Some(params.since),
                _ => None,
            })
            .collect()
    }

    /// Make the next side-effecting call fail with a network error.
    pub fn fail_side_effects_once(&self) {
        *self
            .fail_next_side_effect
            .lock()
            .expect("fail flag lock") = true;
    }

    fn record(&self, call: Call) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn side_effect_result(&self) -> Result<(), AdapterError> {
        let mut flag = self.fail_next_side_effect.lock().expect("fail flag lock");
        if *flag {
            *flag = false;
            return Err(AdapterError::new(
                AdapterErrorCategory::Network,
                "request_failed",
                "scripted side-effect failure",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch_sync(&self, params: &SyncParams) -> Result<SyncBatch, AdapterError> {
        self.record(Call::FetchSync(params.clone()));
        self.fetch_script
            .lock()
            .expect("fetch script lock")
            .pop_front()
            .unwrap_or_else(|| {
                Err(AdapterError::new(
                    AdapterErrorCategory::Network,
                    "script_exhausted",
                    "no more scripted sync batches",
                ))
            })
    }

    async fn join_room(&self, room_id: &str) -> Result<(), AdapterError> {
        self.record(Call::JoinRoom(room_id.to_owned()));
        self.side_effect_result()
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), AdapterError> {
        self.record(Call::LeaveRoom(room_id.to_owned()));
        self.side_effect_result()
    }

    async fn accept_friend_request(&self, request_id: &str) -> Result<(), AdapterError> {
        self.record(Call::AcceptFriendRequest(request_id.to_owned()));
        self.side_effect_result()
    }

    async fn send_text_message(&self, room_id: &str, body: &str) -> Result<(), AdapterError> {
        self.record(Call::SendMessage {
            room_id: room_id.to_owned(),
            body: body.to_owned(),
        });
        self.side_effect_result()
    }
}

/// Responder prefixing every reply with `echo: `.
pub struct EchoResponder;

impl Responder for EchoResponder {
    fn respond(&self, message: &str, _room_id: &str, _sender_id: &str) -> String {
        format!("echo: {message}")
    }
}

/// Responder that always suppresses the reply.
pub struct SilentResponder;

impl Responder for SilentResponder {
    fn respond(&self, _message: &str, _room_id: &str, _sender_id: &str) -> String {
        String::new()
    }
}
