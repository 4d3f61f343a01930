//! # wttelegram - Telegram Bot API client
//!
//! Minimal Bot API client covering what a notification bot needs:
//!
//! - **Sending**: HTML text messages, photo uploads with captions, inline
//!   keyboards.
//! - **Receiving**: `getUpdates` long polling for messages and
//!   inline-keyboard presses, `answerCallbackQuery`, `editMessageText`.
//! - **Errors**: the `{ok, result, description, parameters}` envelope is
//!   mapped to typed errors, with `retry_after` surfaced on rate limits.
//! - **Tracker integration** (feature `tracker`): implements the
//!   `wttracker::MessageSink` trait.
//!
//! ## Example
//!
//! ```no_run
//! use wttelegram::TelegramClient;
//!
//! # async fn example() -> wttelegram::Result<()> {
//! let client = TelegramClient::new("123456:ABC-token")?;
//! client.send_message(42, "\u{2795} <b>Song added</b>").await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod models;

#[cfg(feature = "tracker")]
mod tracker_impl;

pub use client::{
    DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, TelegramClient, TelegramClientBuilder,
};
pub use error::{Result, TelegramError};
pub use models::{
    ApiResponse, CallbackQuery, Chat, InlineKeyboardButton, InlineKeyboardMarkup, Message,
    ResponseParameters, Update, User,
};
