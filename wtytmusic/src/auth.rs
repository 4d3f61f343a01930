//! Browser-export authentication
//!
//! YouTube Music accepts the cookies of a logged-in browser session. The
//! export file is a JSON object holding the request headers copied from the
//! browser's developer tools; only the `cookie` header is required. Each
//! request is then signed with a `SAPISIDHASH` authorization header derived
//! from the `SAPISID` cookie, the current timestamp and the origin.

use crate::error::{Result, YtMusicError};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::Path;

/// Cookie names carrying the SAPISID value, in preference order
const SAPISID_COOKIES: [&str; 2] = ["SAPISID", "__Secure-3PAPISID"];

/// Headers exported from a logged-in browser session
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserAuth {
    /// Raw cookie header of the session
    #[serde(alias = "Cookie")]
    pub cookie: String,
}

impl BrowserAuth {
    /// Creates auth data from a raw cookie header
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            cookie: cookie.into(),
        }
    }

    /// Loads the browser-export JSON file
    ///
    /// # Errors
    ///
    /// [`YtMusicError::Io`] when the file cannot be read, and
    /// [`YtMusicError::Auth`] when it parses but carries no usable cookie.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let auth: Self = serde_json::from_str(&data)
            .map_err(|e| YtMusicError::auth(format!("invalid auth file: {}", e)))?;

        if auth.cookie.trim().is_empty() {
            return Err(YtMusicError::auth("auth file has an empty cookie"));
        }
        auth.sapisid()?;
        Ok(auth)
    }

    /// Builds the `SAPISIDHASH` authorization header for one request
    pub fn authorization_header(&self, origin: &str) -> Result<String> {
        let sapisid = self.sapisid()?;
        let timestamp = chrono::Utc::now().timestamp();

        let mut hasher = Sha1::new();
        hasher.update(format!("{} {} {}", timestamp, sapisid, origin).as_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(format!("SAPISIDHASH {}_{}", timestamp, digest))
    }

    /// Extracts the SAPISID value from the cookie header
    fn sapisid(&self) -> Result<&str> {
        for part in self.cookie.split(';') {
            if let Some((name, value)) = part.trim().split_once('=') {
                if SAPISID_COOKIES.contains(&name) && !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        Err(YtMusicError::auth(format!(
            "cookie has no {} value",
            SAPISID_COOKIES[0]
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sapisid_extraction() {
        let auth = BrowserAuth::new("VISITOR=x; SAPISID=abc123/def; OTHER=y");
        assert_eq!(auth.sapisid().unwrap(), "abc123/def");
    }

    #[test]
    fn test_sapisid_secure_fallback() {
        let auth = BrowserAuth::new("__Secure-3PAPISID=secure_value; OTHER=y");
        assert_eq!(auth.sapisid().unwrap(), "secure_value");
    }

    #[test]
    fn test_missing_sapisid_is_an_error() {
        let auth = BrowserAuth::new("VISITOR=x; OTHER=y");
        assert!(matches!(auth.sapisid(), Err(YtMusicError::Auth(_))));
    }

    #[test]
    fn test_authorization_header_shape() {
        let auth = BrowserAuth::new("SAPISID=abc123");
        let header = auth
            .authorization_header("https://music.youtube.com")
            .unwrap();

        let rest = header.strip_prefix("SAPISIDHASH ").unwrap();
        let (timestamp, digest) = rest.split_once('_').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(digest.len(), 40, "sha1 digest is 40 hex chars");
    }

    #[test]
    fn test_from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser.json");
        std::fs::write(&path, r#"{"cookie": "SAPISID=abc123; OTHER=x"}"#).unwrap();

        let auth = BrowserAuth::from_file(&path).unwrap();
        assert_eq!(auth.sapisid().unwrap(), "abc123");
    }

    #[test]
    fn test_from_file_rejects_cookieless_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browser.json");
        std::fs::write(&path, r#"{"cookie": "OTHER=x"}"#).unwrap();

        assert!(BrowserAuth::from_file(&path).is_err());
    }
}
