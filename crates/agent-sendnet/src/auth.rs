use agent_core::{AdapterError, AdapterErrorCategory, Session};
use serde::Deserialize;
use tracing::debug;

use crate::transport::normalize_node_url;

const ADDRESS_PATH_PREFIX: &str = "/_api/client/v3/address";
const PRE_LOGIN_PATH: &str = "/_api/client/v3/did/pre_login1";
const DID_LOGIN_PATH: &str = "/_api/client/unstable/did/login";

/// External wallet-signing capability.
///
/// Signing algorithm internals are out of scope; the embedding application
/// supplies an implementation backed by its wallet.
pub trait WalletSigner: Send + Sync {
    /// Sign the server-chosen login message, returning the signature string
    /// the node expects.
    fn sign(&self, message: &str) -> Result<String, AdapterError>;
}

#[derive(Debug, Default, Deserialize)]
struct AddressLookupResponse {
    #[serde(default)]
    data: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PreLoginResponse {
    #[serde(default)]
    did: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    random_server: String,
    #[serde(default)]
    updated: String,
}

#[derive(Debug, Default, Deserialize)]
struct DidLoginResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    user_id: String,
}

/// Two-step wallet login flow against a sendnet node.
///
/// Step one fetches the message to sign (plus nonce/time fields); step two
/// submits the wallet signature for a session token. Any failure in either
/// step, or an empty response, yields a uniform auth failure and no session.
#[derive(Debug, Clone)]
pub struct SendnetAuth {
    base_url: String,
    http: reqwest::Client,
}

impl SendnetAuth {
    pub fn new(base_url: &str) -> Result<Self, AdapterError> {
        Ok(Self {
            base_url: normalize_node_url(base_url)?,
            http: reqwest::Client::new(),
        })
    }

    /// Run the full login flow for a wallet address.
    pub async fn login(
        &self,
        address: &str,
        device_id: &str,
        signer: &dyn WalletSigner,
    ) -> Result<Session, AdapterError> {
        let did = self.lookup_did(address).await?;
        debug!(address, did = %did.as_deref().unwrap_or(""), "did lookup complete");

        let pre_login = self.pre_login(address, device_id, did.as_deref()).await?;
        if pre_login.message.is_empty() {
            return Err(login_failed("pre-login returned no message to sign"));
        }

        let signature = signer.sign(&pre_login.message)?;
        let login = self
            .did_login(address, &pre_login, &signature)
            .await?;

        Session::new(login.access_token, login.user_id)
            .map_err(|err| login_failed(err.message))
    }

    /// Resolve the wallet address to a DID when the node knows one.
    async fn lookup_did(&self, address: &str) -> Result<Option<String>, AdapterError> {
        let url = format!("{}{ADDRESS_PATH_PREFIX}/{address}", self.base_url);
        let response: AddressLookupResponse = self.get_json(&url, "address lookup").await?;
        Ok(response.data.into_iter().next())
    }

    async fn pre_login(
        &self,
        address: &str,
        device_id: &str,
        did: Option<&str>,
    ) -> Result<PreLoginResponse, AdapterError> {
        // The node wants exactly one of `did` or `address` populated.
        let body = match did {
            Some(did) => serde_json::json!({
                "device_id": device_id,
                "did": did,
                "address": "",
            }),
            None => serde_json::json!({
                "device_id": device_id,
                "did": "",
                "address": address,
            }),
        };

        let url = format!("{}{PRE_LOGIN_PATH}", self.base_url);
        self.post_json(&url, &body, "pre-login").await
    }

    async fn did_login(
        &self,
        address: &str,
        pre_login: &PreLoginResponse,
        signature: &str,
    ) -> Result<DidLoginResponse, AdapterError> {
        let body = serde_json::json!({
            "identifier": {
                "did": pre_login.did,
                "address": address,
                "message": pre_login.message,
                "token": signature,
                "app_token": "",
            },
            "type": "m.login.did.identity",
            "random_server": pre_login.random_server,
            "updated": pre_login.updated,
        });

        let url = format!("{}{DID_LOGIN_PATH}", self.base_url);
        self.post_json(&url, &body, "did-login").await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        step: &str,
    ) -> Result<T, AdapterError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| login_failed(format!("{step} request failed: {err}")))?;
        decode_login_response(response, step).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
        step: &str,
    ) -> Result<T, AdapterError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| login_failed(format!("{step} request failed: {err}")))?;
        decode_login_response(response, step).await
    }
}

async fn decode_login_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    step: &str,
) -> Result<T, AdapterError> {
    let status = response.status().as_u16();
    if !(200..300).contains(&status) {
        return Err(login_failed(format!("{step} returned status {status}")));
    }
    response
        .json::<T>()
        .await
        .map_err(|err| login_failed(format!("{step} body decode failed: {err}")))
}

fn login_failed(message: impl Into<String>) -> AdapterError {
    AdapterError::new(AdapterErrorCategory::Auth, "login_failed", message)
}
