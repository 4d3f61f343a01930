//! Track, snapshot and playlist identifier models

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Identifier prefixes accepted for regular playlists
const PLAYLIST_PREFIX: &str = "PL";
/// Minimum total length of a `PL` playlist identifier
const PLAYLIST_MIN_LEN: usize = 20;
/// Identifier prefixes accepted for album and mix playlists
const ALBUM_PREFIXES: [&str; 2] = ["OLAK5uy_", "RDCLAK5uy_"];
/// Browse-id wrapper some sources prepend to playlist identifiers
const BROWSE_PREFIX: &str = "VL";

/// One playlist entry as observed at fetch time
///
/// The video id is the only field used to decide whether a track is "the
/// same" across two snapshots; title, artists and thumbnail are payload
/// carried along for notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Stable catalog identifier (YouTube video id)
    pub video_id: String,
    /// Display title
    pub title: String,
    /// Artist names joined for display
    pub artists: String,
    /// Thumbnail URL, when the source provided one
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl Track {
    /// Creates a track without artwork
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        artists: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            artists: artists.into(),
            thumbnail_url: None,
        }
    }

    /// Attaches a thumbnail URL
    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Returns the identity key used for membership comparison
    ///
    /// Tracks whose id is empty after trimming have no usable identity and
    /// are excluded from comparison entirely.
    pub fn identity_key(&self) -> Option<&str> {
        let key = self.video_id.trim();
        if key.is_empty() { None } else { Some(key) }
    }

    /// Single-line "title - artists" label used in summaries
    pub fn label(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.artists)
        }
    }
}

/// Playlist metadata captured alongside a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistMeta {
    /// Playlist title
    pub title: String,
    /// Channel or user owning the playlist
    pub author: String,
    /// Track count as reported by the source, when known
    #[serde(default)]
    pub track_count: Option<u64>,
    /// Playlist cover thumbnail URL
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// The full ordered track list observed at one fetch instant
///
/// A snapshot with an empty track list represents the "never observed"
/// state: comparing against it yields no changes and marks the comparison
/// as initializing (see [`crate::compare`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordered tracks, as returned by the source
    pub tracks: Vec<Track>,
    /// Playlist metadata at fetch time
    pub meta: PlaylistMeta,
    /// When the snapshot was captured
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot captured now
    pub fn new(tracks: Vec<Track>, meta: PlaylistMeta) -> Self {
        Self {
            tracks,
            meta,
            fetched_at: Utc::now(),
        }
    }

    /// The empty, never-observed snapshot
    pub fn empty() -> Self {
        Self::new(Vec::new(), PlaylistMeta::default())
    }

    /// Number of tracks in the snapshot
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the snapshot holds no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// A validated playlist identifier
///
/// Accepts raw identifiers (`PL…`, `OLAK5uy_…`, `RDCLAK5uy_…`), identifiers
/// wrapped in the `VL` browse prefix, and full playlist URLs from which the
/// `list` query parameter is extracted.
///
/// # Examples
///
/// ```
/// use wttracker::PlaylistId;
///
/// let id = PlaylistId::parse("PLabcdefghijklmnopqrstuvwxyz")?;
/// assert_eq!(id.as_str(), "PLabcdefghijklmnopqrstuvwxyz");
///
/// let from_url =
///     PlaylistId::parse("https://music.youtube.com/playlist?list=PLabcdefghijklmnopqrstuvwxyz")?;
/// assert_eq!(from_url, id);
/// # Ok::<(), wttracker::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    /// Parses and validates a playlist identifier or playlist URL
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the input is empty, carries no
    /// `list` parameter despite being a URL, or does not belong to a
    /// recognized identifier family.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = Self::extract_raw(input)?;
        let id = raw.strip_prefix(BROWSE_PREFIX).unwrap_or(&raw);

        if id.starts_with(PLAYLIST_PREFIX) {
            if id.len() < PLAYLIST_MIN_LEN {
                return Err(Error::validation(format!(
                    "playlist id '{}' is too short",
                    id
                )));
            }
            return Ok(Self(id.to_string()));
        }

        if ALBUM_PREFIXES
            .iter()
            .any(|p| id.starts_with(p) && id.len() > p.len())
        {
            return Ok(Self(id.to_string()));
        }

        Err(Error::validation(format!(
            "'{}' is not a recognized playlist identifier",
            id
        )))
    }

    /// Pulls the raw identifier out of the input, handling URL forms
    fn extract_raw(input: &str) -> Result<String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("empty playlist identifier"));
        }

        if let Ok(url) = Url::parse(trimmed) {
            // Only inputs with a host are treated as URLs; bare ids can
            // also parse as scheme:path forms and must fall through
            if url.host().is_some() {
                return match url.query_pairs().find(|(k, _)| k == "list") {
                    Some((_, id)) if !id.is_empty() => Ok(id.into_owned()),
                    _ => Err(Error::validation(format!(
                        "URL '{}' has no 'list' parameter",
                        trimmed
                    ))),
                };
            }
        }

        // Scheme-less URLs still carry the parameter
        if let Some((_, tail)) = trimmed.split_once("list=") {
            let id = tail.split('&').next().unwrap_or(tail);
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }

        Ok(trimmed.to_string())
    }

    /// Builds an identifier from a value already validated at write time
    pub(crate) fn from_stored(id: String) -> Self {
        Self(id)
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PlaylistId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_ID: &str = "PLabcdefghijklmnopqrstuvwxyz";

    #[test]
    fn test_parse_raw_playlist_id() {
        let id = PlaylistId::parse(VALID_ID).unwrap();
        assert_eq!(id.as_str(), VALID_ID);
    }

    #[test]
    fn test_parse_strips_browse_prefix() {
        let id = PlaylistId::parse(&format!("VL{}", VALID_ID)).unwrap();
        assert_eq!(id.as_str(), VALID_ID);
    }

    #[test]
    fn test_parse_extracts_list_parameter() {
        let url = format!(
            "https://music.youtube.com/playlist?list={}&feature=share",
            VALID_ID
        );
        let id = PlaylistId::parse(&url).unwrap();
        assert_eq!(id.as_str(), VALID_ID);
    }

    #[test]
    fn test_parse_accepts_album_prefixes() {
        assert!(PlaylistId::parse("OLAK5uy_abc123").is_ok());
        assert!(PlaylistId::parse("RDCLAK5uy_xyz789").is_ok());
    }

    #[test]
    fn test_parse_rejects_short_playlist_id() {
        let err = PlaylistId::parse("PLshort").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_rejects_unknown_prefix() {
        assert!(PlaylistId::parse("XXabcdefghijklmnopqrstuvwxyz").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(PlaylistId::parse("").is_err());
        assert!(PlaylistId::parse("   ").is_err());
    }

    #[test]
    fn test_parse_rejects_url_without_list() {
        let err = PlaylistId::parse("https://music.youtube.com/watch?v=abc").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_parse_accepts_schemeless_url() {
        let input = format!("music.youtube.com/playlist?list={}", VALID_ID);
        let id = PlaylistId::parse(&input).unwrap();
        assert_eq!(id.as_str(), VALID_ID);
    }

    #[test]
    fn test_identity_key_trims_and_rejects_empty() {
        let track = Track::new("  abc  ", "Title", "Artist");
        assert_eq!(track.identity_key(), Some("abc"));

        let keyless = Track::new("   ", "Title", "Artist");
        assert_eq!(keyless.identity_key(), None);
    }

    #[test]
    fn test_track_label() {
        let track = Track::new("abc", "Song", "Artist A, Artist B");
        assert_eq!(track.label(), "Song - Artist A, Artist B");

        let no_artists = Track::new("abc", "Song", "");
        assert_eq!(no_artists.label(), "Song");
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }
}
