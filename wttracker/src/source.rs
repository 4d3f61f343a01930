//! Collaborator traits the tracking engine depends on
//!
//! The engine never talks to YouTube Music, Telegram or an image host
//! directly. It consumes the three traits below, implemented by the
//! transport crates (or by in-memory fakes in tests).

use crate::Result;
use crate::track::{PlaylistId, Snapshot};
use async_trait::async_trait;

/// Produces the current contents of a playlist
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: one source instance is shared by
/// every concurrently running check cycle.
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Fetches the current snapshot of a playlist
    ///
    /// Fails with [`crate::Error::Fetch`] on any transport or lookup
    /// failure. A failure must never be reported as an empty snapshot:
    /// an empty playlist is a legitimate observation, a failed fetch is
    /// not an observation at all.
    async fn fetch(&self, playlist: &PlaylistId) -> Result<Snapshot>;
}

/// Downloads artwork bytes for notification enrichment
#[async_trait]
pub trait ArtworkFetch: Send + Sync {
    /// Downloads the image at `url`
    ///
    /// Fails with [`crate::Error::Enrichment`]; callers degrade to a
    /// text-only notification on failure.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Delivers notifications to a recipient
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends a text message
    async fn send_text(&self, recipient: i64, text: &str) -> Result<()>;

    /// Sends a photo with a caption
    async fn send_photo(&self, recipient: i64, image: Vec<u8>, caption: &str) -> Result<()>;
}
