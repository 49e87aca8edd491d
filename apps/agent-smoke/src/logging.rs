//! Tracing/logging bootstrap for the smoke agent.

use std::env;

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,agent_smoke=debug,agent_sendnet=debug,agent_core=debug";

/// Initialize global tracing subscriber with severity gating from environment.
///
/// Precedence:
/// 1) `RUST_LOG`
/// 2) `SENDNET_AGENT_LOG`
/// 3) internal default filter
pub fn init() {
    let env_filter = filter_from_env();
    let _ = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let fallback = env::var("SENDNET_AGENT_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok());
    if let Some(filter) = fallback {
        return filter;
    }

    EnvFilter::new(DEFAULT_FILTER)
}
