//! Bot API wire models
//!
//! Only the fields the bot actually reads are modelled; everything else in
//! the Bot API payloads is ignored by serde.

use serde::{Deserialize, Serialize};

/// Response envelope wrapping every Bot API call
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded
    pub ok: bool,
    /// Payload, present on success
    pub result: Option<T>,
    /// Numeric error code, present on failure
    #[serde(default)]
    pub error_code: Option<u16>,
    /// Human-readable error, present on failure
    #[serde(default)]
    pub description: Option<String>,
    /// Extra failure parameters (rate limiting)
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Failure parameters of the response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before retrying, on 429
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// The bot's own account, as returned by `getMe`
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    /// Telegram user id
    pub id: i64,
    /// Display name
    pub first_name: String,
    /// Username without the leading `@`, when set
    #[serde(default)]
    pub username: Option<String>,
}

/// A chat a message belongs to
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat id; negative for groups
    pub id: i64,
}

/// An incoming message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Message id within its chat
    pub message_id: i64,
    /// The chat it was sent in
    pub chat: Chat,
    /// Text content, absent for stickers, photos etc.
    #[serde(default)]
    pub text: Option<String>,
    /// Sender, absent for channel posts
    #[serde(default)]
    pub from: Option<User>,
}

/// A button press on an inline keyboard
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    /// Query id, required to answer the press
    pub id: String,
    /// The user who pressed the button
    pub from: User,
    /// The message the keyboard was attached to
    #[serde(default)]
    pub message: Option<Message>,
    /// The button's callback data
    #[serde(default)]
    pub data: Option<String>,
}

/// One long-polling update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonically increasing update id
    pub update_id: i64,
    /// New incoming message, when this update carries one
    #[serde(default)]
    pub message: Option<Message>,
    /// Inline-keyboard press, when this update carries one
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// Inline keyboard attached to a message
#[derive(Debug, Clone, Default, Serialize)]
pub struct InlineKeyboardMarkup {
    /// Button rows
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    /// A keyboard with a single row of buttons
    pub fn single_row(buttons: Vec<InlineKeyboardButton>) -> Self {
        Self {
            inline_keyboard: vec![buttons],
        }
    }
}

/// One inline keyboard button
///
/// Exactly one of `callback_data` and `url` is set.
#[derive(Debug, Clone, Serialize)]
pub struct InlineKeyboardButton {
    /// Button label
    pub text: String,
    /// Data sent back in a [`CallbackQuery`] when pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    /// URL opened when pressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineKeyboardButton {
    /// A button answering with callback data
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    /// A button opening a URL
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope() {
        let json = r#"{"ok": true, "result": {"id": 42, "first_name": "Bot", "username": "wt_bot"}}"#;
        let response: ApiResponse<User> = serde_json::from_str(json).unwrap();

        assert!(response.ok);
        let user = response.result.unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username.as_deref(), Some("wt_bot"));
    }

    #[test]
    fn test_failure_envelope_with_retry_after() {
        let json = r#"{"ok": false, "error_code": 429,
                       "description": "Too Many Requests: retry after 14",
                       "parameters": {"retry_after": 14}}"#;
        let response: ApiResponse<User> = serde_json::from_str(json).unwrap();

        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.unwrap().retry_after, Some(14));
    }

    #[test]
    fn test_update_with_message() {
        let json = r#"{"update_id": 1, "message": {"message_id": 5,
                       "chat": {"id": -100}, "text": "/check",
                       "from": {"id": 7, "first_name": "Ann"}}}"#;
        let update: Update = serde_json::from_str(json).unwrap();

        let message = update.message.unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/check"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn test_update_with_callback_query() {
        let json = r#"{"update_id": 2, "callback_query": {"id": "abc",
                       "from": {"id": 7, "first_name": "Ann"}, "data": "help"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();

        let query = update.callback_query.unwrap();
        assert_eq!(query.id, "abc");
        assert_eq!(query.data.as_deref(), Some("help"));
    }

    #[test]
    fn test_keyboard_serialization_skips_unset_fields() {
        let keyboard = InlineKeyboardMarkup::single_row(vec![
            InlineKeyboardButton::callback("Help", "help"),
            InlineKeyboardButton::url("Add", "https://t.me/bot?startgroup=true"),
        ]);
        let json = serde_json::to_string(&keyboard).unwrap();

        assert!(json.contains(r#""callback_data":"help""#));
        assert!(json.contains(r#""url":"https://t.me/bot?startgroup=true""#));
        let callback_button = &json[..json.find("Add").unwrap()];
        assert!(!callback_button.contains("url"));
    }
}
