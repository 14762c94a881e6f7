//! Telegram operator notifications.
//!
//! Best-effort: delivery failures are logged and swallowed, never surfaced
//! to the callers driving state transitions.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use super::traits::Notifier;

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
}

impl TelegramNotifier {
    /// Create a notifier from the TELEGRAM_BOT_TOKEN environment variable
    pub fn from_env() -> Option<Self> {
        std::env::var("TELEGRAM_BOT_TOKEN").ok().map(|token| {
            info!("Telegram notifications enabled");
            Self::new(token)
        })
    }

    /// Create a notifier with an explicit bot token
    pub fn new(bot_token: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        match self.client.post(&url).json(&body).send().await {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Telegram notification sent successfully");
                    Ok(())
                } else {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    error!("Telegram notification failed: {} - {}", status, body);
                    Err(format!("HTTP {}: {}", status, body))
                }
            }
            Err(e) => {
                error!("Telegram request failed: {}", e);
                Err(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, operator_id: &str, message: &str) -> bool {
        match self.send_message(operator_id, message).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to notify operator {}: {}", operator_id, e);
                false
            }
        }
    }
}

/// Kill-switch alert text
pub fn kill_switch_message(user_id: &str, reason: &str) -> String {
    let short_user: String = user_id.chars().take(8).collect();
    format!(
        "🛑 KILL SWITCH TRIGGERED\n\
         User: {}...\n\
         Reason: {}\n\
         Trading has been automatically halted.",
        short_user, reason
    )
}

/// Milestone completion alert text
pub fn milestone_message(name: &str, current: i64, target: i64) -> String {
    format!(
        "🎉 MILESTONE COMPLETE: {}\n\
         Evaluated outcomes: {}/{}\n\
         Users can now unlock Full Auto mode.",
        name, current, target
    )
}
