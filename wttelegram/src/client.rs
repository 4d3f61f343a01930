//! HTTP client for the Telegram Bot API
//!
//! Covers the handful of methods the bot needs: sending HTML messages and
//! photos, long-polling updates, and answering inline-keyboard presses.
//!
//! # Example
//!
//! ```no_run
//! use wttelegram::TelegramClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TelegramClient::new("123456:ABC-token")?;
//!
//!     let me = client.get_me().await?;
//!     println!("Authorized as @{}", me.username.unwrap_or_default());
//!
//!     client.send_message(42, "Hello <b>world</b>").await?;
//!     Ok(())
//! }
//! ```

use crate::error::{Result, TelegramError};
use crate::models::{ApiResponse, InlineKeyboardMarkup, Message, Update, User};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Bot API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Default timeout for plain HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Extra slack on top of the long-poll timeout before the HTTP call is cut
const POLL_TIMEOUT_SLACK_SECS: u64 = 10;

/// Telegram Bot API client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl TelegramClient {
    /// Creates a client with default settings
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::builder().build(token)
    }

    /// Creates a builder for configuring the client
    pub fn builder() -> TelegramClientBuilder {
        TelegramClientBuilder::default()
    }

    /// Full URL of one Bot API method
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    /// Checks the token and returns the bot's own account
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({})).await
    }

    /// Sends an HTML-formatted text message
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message> {
        self.call(
            "sendMessage",
            &json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }),
        )
        .await
    }

    /// Sends an HTML-formatted text message with an inline keyboard
    pub async fn send_message_with_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<Message> {
        self.call(
            "sendMessage",
            &json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
                "reply_markup": keyboard,
            }),
        )
        .await
    }

    /// Uploads a photo with an HTML caption
    pub async fn send_photo(&self, chat_id: i64, image: Vec<u8>, caption: &str) -> Result<Message> {
        let part = reqwest::multipart::Part::bytes(image)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("parse_mode", "HTML")
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Long-polls for updates
    ///
    /// Blocks server-side for up to `timeout_secs`; the HTTP timeout is
    /// extended past the poll window so the two never race.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + POLL_TIMEOUT_SLACK_SECS))
            .json(&payload)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Acknowledges an inline-keyboard press
    pub async fn answer_callback_query(&self, query_id: &str) -> Result<bool> {
        self.call(
            "answerCallbackQuery",
            &json!({ "callback_query_id": query_id }),
        )
        .await
    }

    /// Replaces the text (and keyboard) of a previously sent message
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let mut payload = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(keyboard) = keyboard {
            payload["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        self.call("editMessageText", &payload).await
    }

    /// One JSON Bot API call
    async fn call<T: DeserializeOwned>(&self, method: &str, payload: &serde_json::Value) -> Result<T> {
        debug!(method, "Calling Bot API");
        let response = self
            .client
            .post(self.method_url(method))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Unwraps the Bot API response envelope
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await?;

        if envelope.ok {
            if let Some(result) = envelope.result {
                return Ok(result);
            }
        }

        let description = envelope
            .description
            .unwrap_or_else(|| "no description".to_string());
        let retry_after = envelope.parameters.and_then(|p| p.retry_after);
        warn!(code = envelope.error_code.unwrap_or(status), %description, "Bot API call failed");

        Err(TelegramError::from_status_code(
            envelope.error_code.unwrap_or(status),
            description,
            retry_after,
        ))
    }
}

/// Builder for [`TelegramClient`]
#[derive(Debug, Default)]
pub struct TelegramClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl TelegramClientBuilder {
    /// Overrides the API base URL (useful for tests)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the timeout for plain (non-polling) requests
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client with the given bot token
    pub fn build(self, token: impl Into<String>) -> Result<TelegramClient> {
        Ok(TelegramClient {
            client: Client::builder().build()?,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            token: token.into(),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new("123:abc").unwrap();
        assert_eq!(
            client.method_url("sendMessage"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_builder_overrides() {
        let client = TelegramClient::builder()
            .base_url("http://localhost:8081")
            .timeout(Duration::from_secs(5))
            .build("123:abc")
            .unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "http://localhost:8081/bot123:abc/getMe"
        );
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    /// Needs a real bot token in TELEGRAM_BOT_TOKEN
    #[tokio::test]
    #[ignore = "Integration test - calls real Telegram Bot API"]
    async fn test_get_me() {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN not set");
        let client = TelegramClient::new(token).expect("Failed to create client");

        let me = client.get_me().await.expect("getMe failed");
        println!("Authorized as @{}", me.username.unwrap_or_default());
        assert!(me.id > 0);
    }

    /// Needs TELEGRAM_BOT_TOKEN and TELEGRAM_TEST_CHAT
    #[tokio::test]
    #[ignore = "Integration test - calls real Telegram Bot API"]
    async fn test_send_message() {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN not set");
        let chat: i64 = std::env::var("TELEGRAM_TEST_CHAT")
            .expect("TELEGRAM_TEST_CHAT not set")
            .parse()
            .expect("TELEGRAM_TEST_CHAT must be a chat id");
        let client = TelegramClient::new(token).expect("Failed to create client");

        let message = client
            .send_message(chat, "wttelegram integration test")
            .await
            .expect("sendMessage failed");
        assert!(message.message_id > 0);
    }
}
