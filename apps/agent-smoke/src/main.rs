use std::sync::Arc;

use agent_core::AdapterError;
use agent_sendnet::{Responder, SendnetClient, WalletSigner};
use tracing::{error, info};

mod config;
mod logging;

use config::AgentConfig;

/// Signer serving a pre-computed signature from configuration.
///
/// Stands in for a real wallet integration so the smoke agent can run
/// end-to-end against a live node without embedding key material.
struct EnvSigner {
    signature: String,
}

impl WalletSigner for EnvSigner {
    fn sign(&self, _message: &str) -> Result<String, AdapterError> {
        Ok(self.signature.clone())
    }
}

struct SmokeResponder;

impl Responder for SmokeResponder {
    fn respond(&self, message: &str, _room_id: &str, _sender_id: &str) -> String {
        format!("Processed: {message}")
    }
}

#[tokio::main]
async fn main() {
    logging::init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        error!(error = %err, "agent exited with failure");
        std::process::exit(1);
    }
}

async fn run(config: AgentConfig) -> Result<(), AdapterError> {
    let signer = EnvSigner {
        signature: config.wallet_signature.clone(),
    };
    let client = SendnetClient::login(
        &config.base_url,
        &config.wallet_address,
        &config.device_id,
        &signer,
    )
    .await?;
    info!(account_id = %client.session().account_id, "logged in");

    client.start_sync(Arc::new(SmokeResponder)).await?;
    info!("sync loop running, press ctrl-c to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }

    info!("shutting down");
    client.stop_sync().await
}
