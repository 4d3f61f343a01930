//! Error types for the YouTube Music client

/// Result type alias for YouTube Music operations
pub type Result<T> = std::result::Result<T, YtMusicError>;

/// Errors that can occur when using the YouTube Music client
#[derive(Debug, thiserror::Error)]
pub enum YtMusicError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("JSON parsing failed: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Authentication was rejected
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Playlist not found or private
    #[error("Playlist not found: {0}")]
    NotFound(String),

    /// Too many requests
    #[error("Rate limit exceeded, please try again later")]
    RateLimited,

    /// API returned an error status
    #[error("YouTube Music API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// The browse response did not carry the expected renderer structure
    #[error("Failed to parse browse response: {0}")]
    Parse(String),

    /// The browser-export auth file is unusable
    #[error("Auth file error: {0}")]
    Auth(String),

    /// IO error reading the auth file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl YtMusicError {
    /// Creates an API error from an HTTP status code and a message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            404 => Self::NotFound(message.into()),
            429 => Self::RateLimited,
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// Creates a parse error from a message
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates an auth error from a message
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Whether this error means the playlist does not exist or is private
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_code_mapping() {
        assert!(matches!(
            YtMusicError::from_status_code(401, "no"),
            YtMusicError::Unauthorized(_)
        ));
        assert!(matches!(
            YtMusicError::from_status_code(403, "no"),
            YtMusicError::Unauthorized(_)
        ));
        assert!(YtMusicError::from_status_code(404, "gone").is_not_found());
        assert!(matches!(
            YtMusicError::from_status_code(429, ""),
            YtMusicError::RateLimited
        ));
        assert!(matches!(
            YtMusicError::from_status_code(500, "boom"),
            YtMusicError::ApiError { code: 500, .. }
        ));
    }
}
