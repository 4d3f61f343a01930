//! Implementation of the wttracker `MessageSink` trait
//!
//! Gated behind the `tracker` feature so the client stays usable as a
//! standalone Bot API library.

use crate::client::TelegramClient;
use wttracker::MessageSink;

#[async_trait::async_trait]
impl MessageSink for TelegramClient {
    async fn send_text(&self, recipient: i64, text: &str) -> wttracker::Result<()> {
        self.send_message(recipient, text)
            .await
            .map(|_| ())
            .map_err(|e| wttracker::Error::send(e.to_string()))
    }

    async fn send_photo(
        &self,
        recipient: i64,
        image: Vec<u8>,
        caption: &str,
    ) -> wttracker::Result<()> {
        TelegramClient::send_photo(self, recipient, image, caption)
            .await
            .map(|_| ())
            .map_err(|e| wttracker::Error::send(e.to_string()))
    }
}
