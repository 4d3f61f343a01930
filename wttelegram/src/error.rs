//! Error types for the Telegram client

/// Result type alias for Telegram operations
pub type Result<T> = std::result::Result<T, TelegramError>;

/// Errors that can occur when using the Telegram Bot API
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Bot token rejected
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Chat or message not found (e.g. the user deleted the chat)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bot was blocked or kicked by the recipient
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Too many requests; the API asks to wait `retry_after` seconds
    #[error("Rate limit exceeded{}", retry_after.map(|s| format!(", retry after {}s", s)).unwrap_or_default())]
    RateLimited {
        /// Seconds to wait, when the API announced them
        retry_after: Option<u64>,
    },

    /// Bot API returned an error status
    #[error("Telegram API error (code {code}): {message}")]
    ApiError { code: u16, message: String },
}

impl TelegramError {
    /// Creates an API error from a status code and a description
    ///
    /// The Bot API reports rate limiting both as HTTP 429 and in the
    /// response envelope; `retry_after` is carried through when known.
    pub fn from_status_code(code: u16, message: impl Into<String>, retry_after: Option<u64>) -> Self {
        match code {
            401 => Self::Unauthorized(message.into()),
            403 => Self::Forbidden(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimited { retry_after },
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// Whether the error means the recipient cannot be reached at all
    /// (blocked bot, deleted chat) rather than a transient failure
    pub fn is_unreachable_recipient(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::NotFound(_))
    }

    /// Whether this error is rate limiting
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_code_mapping() {
        assert!(matches!(
            TelegramError::from_status_code(401, "bad token", None),
            TelegramError::Unauthorized(_)
        ));
        assert!(
            TelegramError::from_status_code(403, "blocked", None).is_unreachable_recipient()
        );
        assert!(
            TelegramError::from_status_code(404, "no chat", None).is_unreachable_recipient()
        );
        assert!(TelegramError::from_status_code(429, "slow down", Some(7)).is_rate_limit());
        assert!(matches!(
            TelegramError::from_status_code(500, "boom", None),
            TelegramError::ApiError { code: 500, .. }
        ));
    }

    #[test]
    fn test_rate_limit_display_includes_delay() {
        let err = TelegramError::RateLimited {
            retry_after: Some(30),
        };
        assert!(err.to_string().contains("30"));
    }
}
