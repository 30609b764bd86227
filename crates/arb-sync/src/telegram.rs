//! Telegram notifications for executed trades. Best-effort: a failed
//! notification is logged and forgotten, it never touches the trading path.

use arb_core::TelegramConfig;
use reqwest::Client;
use tracing::{debug, warn};

pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    /// Build a notifier when both credentials are present.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        match (&config.bot_token, &config.chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(Self {
                client: Client::new(),
                bot_token: bot_token.clone(),
                chat_id: chat_id.clone(),
            }),
            _ => None,
        }
    }

    pub async fn send_message(&self, message: &str) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let query = [
            ("chat_id", self.chat_id.as_str()),
            ("parse_mode", "Markdown"),
            ("text", message),
        ];

        match self.client.get(&url).query(&query).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("telegram notification sent");
            }
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "telegram API returned error");
            }
            Err(e) => {
                warn!(error = %e, "failed to send telegram notification");
            }
        }
    }
}
