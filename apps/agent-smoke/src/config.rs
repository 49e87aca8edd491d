//! Environment-backed runtime configuration for `agent-smoke`.

use std::{env, error::Error, fmt};

const DEFAULT_BASE_URL: &str = "https://portal0101.sending.network";
const DEFAULT_DEVICE_ID: &str = "sendnet-agent";

/// Runtime configuration used by the smoke agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Base URL of the sendnet node.
    pub base_url: String,
    /// Wallet address to log in with.
    pub wallet_address: String,
    /// Device identifier sent during pre-login.
    pub device_id: String,
    /// Pre-computed wallet signature served by the env-backed signer.
    pub wallet_signature: String,
}

impl AgentConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base_url = optional_trimmed_env("SENDNET_BASE_URL", &mut lookup)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let wallet_address = required_trimmed_env("SENDNET_WALLET_ADDRESS", &mut lookup)?;
        let device_id = optional_trimmed_env("SENDNET_DEVICE_ID", &mut lookup)
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_owned());
        let wallet_signature = required_trimmed_env("SENDNET_WALLET_SIGNATURE", &mut lookup)?;

        Ok(Self {
            base_url,
            wallet_address,
            device_id,
            wallet_signature,
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is absent or blank.
    MissingValue { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingValue { key } => {
                write!(f, "missing required environment variable {key}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn required_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    optional_trimmed_env(key, lookup).ok_or(ConfigError::MissingValue { key })
}
