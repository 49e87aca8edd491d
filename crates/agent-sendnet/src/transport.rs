use std::time::Duration;

use agent_core::{
    classify_http_status, AdapterError, AdapterErrorCategory, Session, SyncBatch, SyncParams,
    SyncResponse, TextMessagePayload,
};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

const CLIENT_API_PREFIX: &str = "/_api/client/r0";

/// Fixed back-off applied when the node reports throttling.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(30);

/// Slack added on top of the long-poll wait so the HTTP timeout never fires
/// before the node's own deadline.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(10);

/// Authenticated transport boundary used by the sync loop and the reaction
/// handlers. Stateless apart from the owned session credential.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch one sync batch for the given cursor parameters.
    ///
    /// A throttling status maps to a `RateLimited` error carrying the fixed
    /// back-off hint; any other non-success status or network error maps to
    /// an unrecoverable transport failure.
    async fn fetch_sync(&self, params: &SyncParams) -> Result<SyncBatch, AdapterError>;

    /// Join a room, typically in reaction to an invite.
    async fn join_room(&self, room_id: &str) -> Result<(), AdapterError>;

    /// Leave a room.
    async fn leave_room(&self, room_id: &str) -> Result<(), AdapterError>;

    /// Accept a friend request by id.
    async fn accept_friend_request(&self, request_id: &str) -> Result<(), AdapterError>;

    /// Send a plain-text message to a room.
    async fn send_text_message(&self, room_id: &str, body: &str) -> Result<(), AdapterError>;
}

/// HTTP transport against a sendnet node.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    session: Session,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, session: Session) -> Result<Self, AdapterError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            session,
            http: reqwest::Client::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn sync_path(params: &SyncParams) -> String {
        format!("{CLIENT_API_PREFIX}/sync?{}", params.query_string())
    }

    pub fn join_path(room_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/join/{room_id}")
    }

    pub fn leave_path(room_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/leave/{room_id}")
    }

    pub fn friend_accept_path(request_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/relation/friends/{request_id}/accept")
    }

    pub fn send_message_path(room_id: &str, client_msg_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/rooms/{room_id}/send/m.room.message/{client_msg_id}")
    }

    pub fn display_name_path(account_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/profile/{account_id}/displayname")
    }

    pub fn avatar_url_path(account_id: &str) -> String {
        format!("{CLIENT_API_PREFIX}/profile/{account_id}/avatar_url")
    }

    /// Set the account's display name. Thin wrapper, no branching.
    pub async fn set_display_name(&self, display_name: &str) -> Result<(), AdapterError> {
        let path = Self::display_name_path(&self.session.account_id);
        let body = serde_json::json!({ "displayname": display_name });
        self.put_expect_success(&path, &body, "set_display_name")
            .await
    }

    /// Set the account's avatar URL. Thin wrapper, no branching.
    pub async fn set_avatar_url(&self, avatar_url: &str) -> Result<(), AdapterError> {
        let path = Self::avatar_url_path(&self.session.account_id);
        let body = serde_json::json!({ "avatar_url": avatar_url });
        self.put_expect_success(&path, &body, "set_avatar_url").await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_expect_success(
        &self,
        path: &str,
        operation: &str,
    ) -> Result<(), AdapterError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.session.access_token)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|err| request_error(operation, err))?;
        expect_success(response, operation).await
    }

    async fn put_expect_success<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
        operation: &str,
    ) -> Result<(), AdapterError> {
        let response = self
            .http
            .put(self.endpoint(path))
            .bearer_auth(&self.session.access_token)
            .json(body)
            .send()
            .await
            .map_err(|err| request_error(operation, err))?;
        expect_success(response, operation).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_sync(&self, params: &SyncParams) -> Result<SyncBatch, AdapterError> {
        let url = self.endpoint(&Self::sync_path(params));
        let request_timeout =
            Duration::from_millis(params.timeout_ms) + REQUEST_TIMEOUT_MARGIN;

        let started = std::time::Instant::now();
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.session.access_token)
            .timeout(request_timeout)
            .send()
            .await
            .map_err(|err| request_error("sync", err))?;

        let status = response.status().as_u16();
        if status == 429 {
            return Err(AdapterError::new(
                AdapterErrorCategory::RateLimited,
                "sync_rate_limited",
                format!("sync request throttled, url: {url}"),
            )
            .with_retry_after(RATE_LIMIT_BACKOFF));
        }
        if !(200..300).contains(&status) {
            return Err(http_status_error("sync", status));
        }

        let body: SyncResponse = response.json().await.map_err(|err| {
            AdapterError::new(
                AdapterErrorCategory::Serialization,
                "sync_decode_error",
                err.to_string(),
            )
        })?;

        debug!(
            url,
            elapsed_ms = started.elapsed().as_millis() as u64,
            next_batch = %body.next_batch,
            "sync fetch succeeded"
        );

        Ok(SyncBatch {
            next_token: body.next_batch.clone(),
            response: body,
        })
    }

    async fn join_room(&self, room_id: &str) -> Result<(), AdapterError> {
        self.post_expect_success(&Self::join_path(room_id), "join_room")
            .await
    }

    async fn leave_room(&self, room_id: &str) -> Result<(), AdapterError> {
        self.post_expect_success(&Self::leave_path(room_id), "leave_room")
            .await
    }

    async fn accept_friend_request(&self, request_id: &str) -> Result<(), AdapterError> {
        self.post_expect_success(&Self::friend_accept_path(request_id), "accept_friend_request")
            .await
    }

    async fn send_text_message(&self, room_id: &str, body: &str) -> Result<(), AdapterError> {
        let client_msg_id = Uuid::new_v4().to_string();
        let path = Self::send_message_path(room_id, &client_msg_id);
        self.put_expect_success(&path, &TextMessagePayload::text(body), "send_text_message")
            .await
    }
}

pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, AdapterError> {
    let trimmed = base_url.trim();
    if trimmed.is_empty() {
        return Err(AdapterError::new(
            AdapterErrorCategory::Config,
            "base_url_missing",
            "node base URL must not be empty",
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_owned())
}

fn request_error(operation: &str, err: reqwest::Error) -> AdapterError {
    AdapterError::new(
        AdapterErrorCategory::Network,
        "request_failed",
        format!("{operation} request failed: {err}"),
    )
}

fn http_status_error(operation: &str, status: u16) -> AdapterError {
    let mut mapped = AdapterError::new(
        classify_http_status(status),
        "http_error",
        format!("{operation} request failed with status {status}"),
    );
    if mapped.category == AdapterErrorCategory::RateLimited {
        mapped = mapped.with_retry_after(RATE_LIMIT_BACKOFF);
    }
    mapped
}

async fn expect_success(response: reqwest::Response, operation: &str) -> Result<(), AdapterError> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(());
    }
    Err(http_status_error(operation, status))
}

pub(crate) use normalize_base_url as normalize_node_url;

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::SyncCursor;
    use httpmock::prelude::*;

    fn session() -> Session {
        Session::new("syt_token", "@agent:node").expect("session should build")
    }

    #[test]
    fn path_helpers_are_deterministic() {
        let params = SyncCursor::at("b1").fetch_params();
        assert_eq!(
            HttpTransport::sync_path(&params),
            "/_api/client/r0/sync?timeout=30000&since=b1"
        );
        assert_eq!(
            HttpTransport::join_path("!r1:node"),
            "/_api/client/r0/join/!r1:node"
        );
        assert_eq!(
            HttpTransport::friend_accept_path("fr-1"),
            "/_api/client/r0/relation/friends/fr-1/accept"
        );
        assert_eq!(
            HttpTransport::send_message_path("!r1:node", "msg-1"),
            "/_api/client/r0/rooms/!r1:node/send/m.room.message/msg-1"
        );
    }

    #[test]
    fn rejects_empty_base_url() {
        let err = HttpTransport::new("   ", session()).expect_err("blank url must fail");
        assert_eq!(err.code, "base_url_missing");
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let transport =
            HttpTransport::new("https://node.example/", session()).expect("transport builds");
        assert_eq!(transport.endpoint("/x"), "https://node.example/x");
    }

    #[tokio::test]
    async fn discovery_fetch_uses_zero_timeout_and_no_since() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_api/client/r0/sync")
                    .query_param("timeout", "0")
                    .query_param("dry-run", "true")
                    .header("authorization", "Bearer syt_token");
                then.status(200).json_body(serde_json::json!({
                    "next_batch": "b1"
                }));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        let batch = transport
            .fetch_sync(&SyncCursor::empty().fetch_params())
            .await
            .expect("discovery fetch should succeed");

        mock.assert_async().await;
        assert_eq!(batch.next_token, "b1");
    }

    #[tokio::test]
    async fn long_poll_fetch_carries_since_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/_api/client/r0/sync")
                    .query_param("timeout", "30000")
                    .query_param("since", "b1");
                then.status(200).json_body(serde_json::json!({
                    "next_batch": "b2",
                    "rooms": {"join": {}}
                }));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        let batch = transport
            .fetch_sync(&SyncCursor::at("b1").fetch_params())
            .await
            .expect("long-poll fetch should succeed");

        mock.assert_async().await;
        assert_eq!(batch.next_token, "b2");
    }

    #[tokio::test]
    async fn throttled_fetch_maps_to_rate_limited_with_fixed_hint() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_api/client/r0/sync");
                then.status(429);
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        let err = transport
            .fetch_sync(&SyncCursor::at("b1").fetch_params())
            .await
            .expect_err("429 must map to rate limited");

        assert_eq!(err.category, AdapterErrorCategory::RateLimited);
        assert_eq!(err.retry_after_ms, Some(30_000));
    }

    #[tokio::test]
    async fn server_error_maps_to_network_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/_api/client/r0/sync");
                then.status(502);
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        let err = transport
            .fetch_sync(&SyncCursor::empty().fetch_params())
            .await
            .expect_err("502 must fail the fetch");

        assert_eq!(err.category, AdapterErrorCategory::Network);
        assert_eq!(err.code, "http_error");
    }

    #[tokio::test]
    async fn join_room_posts_to_join_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_api/client/r0/join/!r1:node")
                    .header("authorization", "Bearer syt_token");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        transport
            .join_room("!r1:node")
            .await
            .expect("join should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn leave_room_posts_to_leave_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_api/client/r0/leave/!r1:node")
                    .header("authorization", "Bearer syt_token");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        transport
            .leave_room("!r1:node")
            .await
            .expect("leave should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn profile_setters_put_to_profile_endpoints() {
        let server = MockServer::start_async().await;
        let name_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/_api/client/r0/profile/@agent:node/displayname")
                    .json_body_partial(r#"{"displayname": "Agent"}"#);
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        let avatar_mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/_api/client/r0/profile/@agent:node/avatar_url")
                    .json_body_partial(r#"{"avatar_url": "mxc://node/abc"}"#);
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        transport
            .set_display_name("Agent")
            .await
            .expect("display name update should succeed");
        transport
            .set_avatar_url("mxc://node/abc")
            .await
            .expect("avatar update should succeed");
        name_mock.assert_async().await;
        avatar_mock.assert_async().await;
    }

    #[tokio::test]
    async fn accept_friend_request_posts_to_accept_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/_api/client/r0/relation/friends/fr-1/accept");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        transport
            .accept_friend_request("fr-1")
            .await
            .expect("accept should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_text_message_puts_formatted_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path_matches(Regex::new(
                        r"^/_api/client/r0/rooms/!r1:node/send/m\.room\.message/[0-9a-f-]+$",
                    ).expect("regex should compile"))
                    .json_body_partial(
                        r#"{"msgtype": "m.text", "body": "hello",
                            "format": "org.matrix.custom.html",
                            "formatted_body": "hello"}"#,
                    );
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        transport
            .send_text_message("!r1:node", "hello")
            .await
            .expect("send should succeed");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn forbidden_side_effect_maps_to_auth_category() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/_api/client/r0/join/!r1:node");
                then.status(403);
            })
            .await;

        let transport =
            HttpTransport::new(&server.base_url(), session()).expect("transport builds");
        let err = transport
            .join_room("!r1:node")
            .await
            .expect_err("403 must fail the join");
        assert_eq!(err.category, AdapterErrorCategory::Auth);
    }
}
