//! HTTP client for the YouTube Music browse API
//!
//! Playlists are read through the internal `youtubei/v1/browse` endpoint
//! with the `WEB_REMIX` client context, the same call the web player makes.
//! Public playlists need no credentials; private ones need a browser-export
//! cookie (see [`BrowserAuth`]).
//!
//! # Example
//!
//! ```no_run
//! use wtytmusic::YtMusicClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = YtMusicClient::new()?;
//!     let playlist = client.fetch_playlist("PLabcdefghijklmnopqrstuvwxyz").await?;
//!
//!     println!("{} by {} - {} tracks",
//!         playlist.title, playlist.author, playlist.tracks.len());
//!     Ok(())
//! }
//! ```

use crate::auth::BrowserAuth;
use crate::error::{Result, YtMusicError};
use crate::models::Playlist;
use reqwest::Client;
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Default youtubei API base URL
pub const DEFAULT_BASE_URL: &str = "https://music.youtube.com/youtubei/v1";

/// Origin sent with every request (also signs the SAPISIDHASH)
const ORIGIN: &str = "https://music.youtube.com";

/// Client version reported in the WEB_REMIX context
const CLIENT_VERSION: &str = "1.20250203.01.00";

/// Default timeout for HTTP requests (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// YouTube Music HTTP client
///
/// The client is stateless and cheap to clone; clones share the underlying
/// connection pool.
#[derive(Debug, Clone)]
pub struct YtMusicClient {
    client: Client,
    base_url: String,
    auth: Option<BrowserAuth>,
}

impl YtMusicClient {
    /// Creates an unauthenticated client with default settings
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Creates a builder for configuring the client
    pub fn builder() -> YtMusicClientBuilder {
        YtMusicClientBuilder::default()
    }

    /// Whether the client sends authenticated requests
    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Fetches the current contents of a playlist
    ///
    /// # Arguments
    ///
    /// * `playlist_id` - Raw playlist identifier; a `VL` browse prefix is
    ///   accepted and not doubled
    ///
    /// # Errors
    ///
    /// [`YtMusicError::NotFound`] for unknown or private playlists,
    /// [`YtMusicError::Unauthorized`] when credentials are rejected, and
    /// [`YtMusicError::Parse`] when the response has no playlist shelf.
    pub async fn fetch_playlist(&self, playlist_id: &str) -> Result<Playlist> {
        let browse_id = if playlist_id.starts_with("VL") {
            playlist_id.to_string()
        } else {
            format!("VL{}", playlist_id)
        };

        debug!(browse_id = %browse_id, "Browsing playlist");

        let payload = json!({
            "context": {
                "client": {
                    "clientName": "WEB_REMIX",
                    "clientVersion": CLIENT_VERSION,
                    "hl": "en",
                }
            },
            "browseId": browse_id,
        });

        let mut request = self
            .client
            .post(format!("{}/browse?prettyPrint=false", self.base_url))
            .header("Origin", ORIGIN)
            .header("X-Origin", ORIGIN)
            .json(&payload);

        if let Some(auth) = &self.auth {
            request = request
                .header("Cookie", &auth.cookie)
                .header("Authorization", auth.authorization_header(ORIGIN)?)
                .header("X-Goog-AuthUser", "0");
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Browse request failed");
            return Err(YtMusicError::from_status_code(
                status.as_u16(),
                api_error_message(&body),
            ));
        }

        let value: Value = response.json().await?;

        // The endpoint answers 200 with an error object for bad browse ids
        if let Some(error) = value.get("error") {
            let code = error.get("code").and_then(Value::as_u64).unwrap_or(0) as u16;
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            warn!(code, message, "Browse API error");
            return Err(YtMusicError::from_status_code(code, message));
        }

        Playlist::from_browse_response(&value, playlist_id)
    }
}

/// Pulls the message out of a JSON error body, falling back to the raw text
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Builder for [`YtMusicClient`]
#[derive(Debug, Default)]
pub struct YtMusicClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    auth: Option<BrowserAuth>,
}

impl YtMusicClientBuilder {
    /// Overrides the API base URL (useful for tests)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Authenticates with browser-export data
    pub fn auth(mut self, auth: BrowserAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Authenticates with a browser-export JSON file
    pub fn auth_file(mut self, path: &Path) -> Result<Self> {
        self.auth = Some(BrowserAuth::from_file(path)?);
        Ok(self)
    }

    /// Builds the client
    pub fn build(self) -> Result<YtMusicClient> {
        let client = Client::builder()
            .timeout(
                self.timeout
                    .unwrap_or(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            )
            .user_agent(self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        Ok(YtMusicClient {
            client,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            auth: self.auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = YtMusicClient::new().unwrap();
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_builder_with_auth() {
        let client = YtMusicClient::builder()
            .auth(BrowserAuth::new("SAPISID=abc"))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert!(client.is_authenticated());
    }

    #[test]
    fn test_api_error_message_extraction() {
        let body = r#"{"error": {"code": 404, "message": "The playlist does not exist."}}"#;
        assert_eq!(api_error_message(body), "The playlist does not exist.");

        assert_eq!(api_error_message("plain text"), "plain text");
    }

    /// Fetch a well-known public playlist
    #[tokio::test]
    #[ignore = "Integration test - calls real YouTube Music API"]
    async fn test_fetch_public_playlist() {
        let client = YtMusicClient::new().expect("Failed to create client");
        let playlist = client
            .fetch_playlist("RDCLAK5uy_kb7EBi6y3GrtJri4_ZH56Ms786DFEimbM")
            .await;

        assert!(
            playlist.is_ok(),
            "Failed to fetch playlist: {:?}",
            playlist.err()
        );

        let playlist = playlist.unwrap();
        println!(
            "{} by {} - {} tracks",
            playlist.title,
            playlist.author,
            playlist.tracks.len()
        );
        assert!(!playlist.tracks.is_empty(), "Expected at least one track");
        for track in playlist.tracks.iter().take(5) {
            println!("  - {} ({})", track.title, track.artists_display());
        }
    }

    /// An invalid playlist id must fail, not come back empty
    #[tokio::test]
    #[ignore = "Integration test - calls real YouTube Music API"]
    async fn test_fetch_unknown_playlist_fails() {
        let client = YtMusicClient::new().expect("Failed to create client");
        let result = client.fetch_playlist("PLdoesnotexistdoesnotexist0").await;

        assert!(result.is_err(), "Expected error for unknown playlist");
        println!("Got expected error: {:?}", result.err());
    }
}
