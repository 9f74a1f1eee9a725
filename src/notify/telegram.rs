use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::format::format_listing_message;
use super::Notifier;
use crate::api::Listing;
use crate::core::config::TelegramConfig;
use crate::core::error::DeliveryError;

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends one `sendMessage` per call. Never retries: the Bot API has no idempotency key,
/// so a retry after an ambiguous failure could post the same listing twice.
pub struct TelegramNotifier {
    client: Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: &TelegramConfig) -> Self {
        Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    async fn send_message(&self, text: &str) -> Result<(), DeliveryError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            // reqwest errors carry the URL, which carries the bot token
            .map_err(|e| DeliveryError(e.to_string().replace(&self.bot_token, "<redacted>")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DeliveryError(format!("Telegram answered {status}: {body}")));
        }

        match serde_json::from_str::<TelegramResponse>(&body) {
            Ok(parsed) if parsed.ok => Ok(()),
            Ok(parsed) => Err(DeliveryError(format!(
                "Telegram refused message: {}",
                parsed.description.unwrap_or_else(|| "no description".to_string())
            ))),
            Err(e) => Err(DeliveryError(format!("unreadable Telegram response: {e}"))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, listing: &Listing) -> Result<(), DeliveryError> {
        self.send_message(&format_listing_message(listing)).await?;
        tracing::info!(listing_id = %listing.id, "📨 Notification sent: {}", listing.title);
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<(), DeliveryError> {
        self.send_message(text).await
    }
}
