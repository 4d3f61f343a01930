//! Error types for the tracking engine

use std::time::Duration;

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while tracking a playlist
///
/// None of these is fatal to the process: the scheduler keeps running after
/// any single cycle's failure, and delivery failures never abort a cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The track source could not produce a snapshot
    #[error("Playlist fetch failed: {0}")]
    Fetch(String),

    /// The snapshot store could not be read or written
    #[error("State persistence failed: {0}")]
    Persist(String),

    /// Artwork could not be downloaded for a notification
    #[error("Artwork fetch failed: {0}")]
    Enrichment(String),

    /// A message could not be delivered to a recipient
    #[error("Message delivery failed: {0}")]
    Send(String),

    /// A playlist identifier did not match the accepted shape
    #[error("Invalid playlist identifier: {0}")]
    Validation(String),

    /// A check cycle ran past its configured deadline and was abandoned
    #[error("Check cycle abandoned after {0:?}")]
    Deadline(Duration),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a fetch error from a message
    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::Fetch(msg.into())
    }

    /// Create a persistence error from a message
    pub fn persist(msg: impl Into<String>) -> Self {
        Self::Persist(msg.into())
    }

    /// Create an enrichment error from a message
    pub fn enrichment(msg: impl Into<String>) -> Self {
        Self::Enrichment(msg.into())
    }

    /// Create a delivery error from a message
    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    /// Create a validation error from a message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error comes from validating a playlist identifier
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Whether this error comes from the track source (including deadline
    /// expiry, which is handled like a failed fetch)
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Deadline(_))
    }
}
