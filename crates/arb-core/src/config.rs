use crate::error::{BotError, Result};
use alloy_primitives::Address;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default private relay; overridable via `RELAY_RPC_URL`.
const DEFAULT_RELAY_RPC_URL: &str = "https://rpc.flashbots.net/fast";

/// Telegram notification configuration. Notifications are best-effort and
/// disabled when either credential is missing.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn from_env() -> Self {
        Self {
            bot_token: env::var("BOT_TOKEN").ok().filter(|v| !v.is_empty()),
            chat_id: env::var("CHAT_ID").ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }
}

/// Runtime configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// General-purpose endpoint: reads, gas estimation, deployment.
    pub rpc_url: String,
    /// Block-header subscription endpoint.
    pub ws_url: String,
    /// Archive-capable endpoint for deep log ranges during bootstrap.
    pub history_rpc_url: String,
    /// Private relay; only ever sees final signed transactions.
    pub relay_rpc_url: String,
    /// Executor contract to bind to. Empty means deploy a fresh one from
    /// `mev_bytecode_path`.
    pub mev_address: Option<Address>,
    /// Hex-encoded signing key.
    pub priv_key: String,
    pub telegram: TelegramConfig,
    /// Deadline applied to every outbound RPC call.
    pub rpc_timeout: Duration,
    /// Location of the persisted pool snapshot.
    pub state_path: PathBuf,
    /// Creation bytecode for the executor contract, used only when
    /// `mev_address` is unset.
    pub mev_bytecode_path: PathBuf,
}

impl BotConfig {
    pub fn load() -> Result<Self> {
        let rpc_url = sanitize_url(require("RPC_URL")?);
        let ws_url = sanitize_url(require("WS_URL")?);
        let history_rpc_url = sanitize_url(require("HISTORY_RPC_URL")?);
        let priv_key = require("PRIV_KEY")?;

        let relay_rpc_url = env::var("RELAY_RPC_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(sanitize_url)
            .unwrap_or_else(|| DEFAULT_RELAY_RPC_URL.to_string());

        let mev_address = match env::var("MEV_ADDRESS") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<Address>()
                    .map_err(|e| BotError::Config(format!("MEV_ADDRESS: {e}")))?,
            ),
            _ => None,
        };

        let rpc_timeout_secs: u64 = env::var("RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let state_path = env::var("STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/pools.json"));

        let mev_bytecode_path = env::var("MEV_BYTECODE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/executor.bin"));

        Ok(Self {
            rpc_url,
            ws_url,
            history_rpc_url,
            relay_rpc_url,
            mev_address,
            priv_key,
            telegram: TelegramConfig::from_env(),
            rpc_timeout: Duration::from_secs(rpc_timeout_secs),
            state_path,
            mev_bytecode_path,
        })
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).map_err(|_| BotError::MissingEnvVar(name.to_string()))
}

/// Strip whitespace and surrounding quotes; .env files copied around tend to
/// accumulate both.
fn sanitize_url(url: String) -> String {
    let trimmed = url.trim();
    let without_quotes = if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2
    {
        &trimmed[1..trimmed.len() - 1]
    } else if trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2 {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    without_quotes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_url("\"https://a\"".into()), "https://a");
        assert_eq!(sanitize_url("  'wss://b' ".into()), "wss://b");
        assert_eq!(sanitize_url("https://c".into()), "https://c");
    }
}
