//! Playlist models and browse-response parsing
//!
//! The youtubei browse endpoint answers with deeply nested renderer JSON
//! whose exact shape shifts between frontend releases. Parsing is therefore
//! permissive: renderers are located by key anywhere in the tree, and a
//! track missing a field is skipped rather than failing the whole playlist.

use crate::error::{Result, YtMusicError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// One playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistTrack {
    /// Stable video identifier
    pub video_id: String,
    /// Display title
    pub title: String,
    /// Artist names, in display order
    pub artists: Vec<String>,
    /// Largest known thumbnail URL
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl PlaylistTrack {
    /// Artist names joined for display
    pub fn artists_display(&self) -> String {
        self.artists.join(", ")
    }

    /// Builds a track from one `musicResponsiveListItemRenderer`
    ///
    /// Returns `None` when the renderer carries no video id, which happens
    /// for unavailable or deleted entries.
    fn from_renderer(item: &Value) -> Option<Self> {
        let video_id = item
            .get("playlistItemData")
            .and_then(|d| d.get("videoId"))
            .and_then(Value::as_str)
            .or_else(|| {
                find_key(item, "watchEndpoint")
                    .and_then(|w| w.get("videoId"))
                    .and_then(Value::as_str)
            })?
            .to_string();

        let columns = item.get("flexColumns").and_then(Value::as_array)?;
        let title = columns.first().and_then(column_first_text)?;
        let artists = columns.get(1).map(column_artist_names).unwrap_or_default();

        Some(Self {
            video_id,
            title,
            artists,
            thumbnail_url: best_thumbnail(item),
        })
    }
}

/// A playlist as returned by the browse endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist identifier (without the `VL` browse prefix)
    pub id: String,
    /// Playlist title
    pub title: String,
    /// Channel or user owning the playlist
    pub author: String,
    /// Track count as reported by the header, when present
    #[serde(default)]
    pub track_count: Option<u64>,
    /// Playlist cover thumbnail URL
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Ordered tracks
    pub tracks: Vec<PlaylistTrack>,
}

impl Playlist {
    /// Parses a full browse response into a playlist
    ///
    /// # Errors
    ///
    /// Returns [`YtMusicError::Parse`] when the response carries no
    /// playlist shelf at all (wrong browse id, empty error response).
    pub fn from_browse_response(response: &Value, id: &str) -> Result<Self> {
        let shelf = find_key(response, "musicPlaylistShelfRenderer")
            .ok_or_else(|| YtMusicError::parse("no playlist shelf in browse response"))?;

        let mut tracks = Vec::new();
        if let Some(contents) = shelf.get("contents").and_then(Value::as_array) {
            for entry in contents {
                if let Some(item) = entry.get("musicResponsiveListItemRenderer") {
                    match PlaylistTrack::from_renderer(item) {
                        Some(track) => tracks.push(track),
                        None => debug!("Skipping playlist entry without video id"),
                    }
                }
            }
        }

        // Both header generations are still seen in the wild
        let header = find_key(response, "musicResponsiveHeaderRenderer")
            .or_else(|| find_key(response, "musicDetailHeaderRenderer"));

        let title = header
            .and_then(|h| h.get("title"))
            .and_then(first_run_text)
            .unwrap_or_else(|| id.to_string());
        let author = header.and_then(author_text).unwrap_or_default();
        let track_count = header
            .and_then(|h| h.get("secondSubtitle"))
            .and_then(runs_text)
            .as_deref()
            .and_then(parse_track_count);
        let thumbnail_url = header.and_then(best_thumbnail);

        Ok(Self {
            id: id.to_string(),
            title,
            author,
            track_count,
            thumbnail_url,
            tracks,
        })
    }
}

/// Depth-first search for the first occurrence of `key` in the tree
pub(crate) fn find_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => {
            if let Some(found) = map.get(key) {
                return Some(found);
            }
            map.values().find_map(|v| find_key(v, key))
        }
        Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// Concatenated text of a `{runs: [{text}, …]}` node
fn runs_text(value: &Value) -> Option<String> {
    let runs = value.get("runs")?.as_array()?;
    let text: String = runs
        .iter()
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() { None } else { Some(text) }
}

/// Text of the first run of a `{runs: […]}` node
fn first_run_text(value: &Value) -> Option<String> {
    value
        .get("runs")?
        .as_array()?
        .first()?
        .get("text")?
        .as_str()
        .map(str::to_string)
}

/// Text of a flex column's first run
fn column_first_text(column: &Value) -> Option<String> {
    column
        .get("musicResponsiveListItemFlexColumnRenderer")
        .and_then(|c| c.get("text"))
        .and_then(first_run_text)
}

/// Artist names of the secondary flex column
///
/// Runs carrying a navigation endpoint are artist links; separator runs
/// (" • ", " & ") have none. A column without any linked run falls back to
/// its first run, which covers uploader-style playlists.
fn column_artist_names(column: &Value) -> Vec<String> {
    let runs = column
        .get("musicResponsiveListItemFlexColumnRenderer")
        .and_then(|c| c.get("text"))
        .and_then(|t| t.get("runs"))
        .and_then(Value::as_array);

    let Some(runs) = runs else {
        return Vec::new();
    };

    let linked: Vec<String> = runs
        .iter()
        .filter(|r| r.get("navigationEndpoint").is_some())
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if !linked.is_empty() {
        return linked;
    }

    runs.iter()
        .filter_map(|r| r.get("text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "•" && *t != "&")
        .map(str::to_string)
        .take(1)
        .collect()
}

/// URL of the largest thumbnail anywhere under `value`
///
/// Thumbnail arrays are ordered smallest first.
fn best_thumbnail(value: &Value) -> Option<String> {
    find_key(value, "thumbnails")?
        .as_array()?
        .last()?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

/// Extracts the leading count from texts like "123 songs • 8+ hours"
fn parse_track_count(text: &str) -> Option<u64> {
    text.split_whitespace()
        .find(|token| token.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .and_then(|token| token.replace(',', "").parse().ok())
}

fn author_text(header: &Value) -> Option<String> {
    // Current header generation
    if let Some(text) = header.get("straplineTextOne").and_then(first_run_text) {
        return Some(text);
    }

    // Older detail header: the author run is the one carrying a link,
    // among "Playlist • Author • Year" subtitle runs
    let runs = header.get("subtitle")?.get("runs")?.as_array()?;
    runs.iter()
        .find(|r| r.get("navigationEndpoint").is_some())
        .or_else(|| runs.get(2))
        .and_then(|r| r.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn track_renderer(video_id: &str, title: &str, artist: &str) -> Value {
        json!({
            "musicResponsiveListItemRenderer": {
                "playlistItemData": {"videoId": video_id},
                "thumbnail": {"musicThumbnailRenderer": {"thumbnail": {"thumbnails": [
                    {"url": "https://img/small.jpg", "width": 60},
                    {"url": "https://img/large.jpg", "width": 544}
                ]}}},
                "flexColumns": [
                    {"musicResponsiveListItemFlexColumnRenderer": {"text": {"runs": [
                        {"text": title}
                    ]}}},
                    {"musicResponsiveListItemFlexColumnRenderer": {"text": {"runs": [
                        {"text": artist, "navigationEndpoint": {"browseEndpoint": {"browseId": "UCx"}}},
                        {"text": " & "},
                        {"text": "Second Artist", "navigationEndpoint": {"browseEndpoint": {"browseId": "UCy"}}}
                    ]}}}
                ]
            }
        })
    }

    fn browse_response() -> Value {
        json!({
            "contents": {"twoColumnBrowseResultsRenderer": {"secondaryContents": {
                "sectionListRenderer": {"contents": [
                    {"musicPlaylistShelfRenderer": {"contents": [
                        track_renderer("vid1", "First Song", "Artist One"),
                        track_renderer("vid2", "Second Song", "Artist Two"),
                        {"musicResponsiveListItemRenderer": {
                            "flexColumns": [
                                {"musicResponsiveListItemFlexColumnRenderer": {"text": {"runs": [
                                    {"text": "Unavailable"}
                                ]}}}
                            ]
                        }}
                    ]}}
                ]}
            }}},
            "header": {"musicResponsiveHeaderRenderer": {
                "title": {"runs": [{"text": "My Mix"}]},
                "straplineTextOne": {"runs": [{"text": "Some Channel"}]},
                "secondSubtitle": {"runs": [{"text": "42 songs"}, {"text": " • "}, {"text": "3 hours"}]},
                "thumbnail": {"musicThumbnailRenderer": {"thumbnail": {"thumbnails": [
                    {"url": "https://img/cover.jpg", "width": 544}
                ]}}}
            }}
        })
    }

    #[test]
    fn test_parse_browse_response() {
        let playlist = Playlist::from_browse_response(&browse_response(), "PLtest").unwrap();

        assert_eq!(playlist.id, "PLtest");
        assert_eq!(playlist.title, "My Mix");
        assert_eq!(playlist.author, "Some Channel");
        assert_eq!(playlist.track_count, Some(42));
        assert_eq!(playlist.thumbnail_url.as_deref(), Some("https://img/cover.jpg"));
    }

    #[test]
    fn test_parse_tracks_in_order_skipping_unavailable() {
        let playlist = Playlist::from_browse_response(&browse_response(), "PLtest").unwrap();

        assert_eq!(playlist.tracks.len(), 2, "the entry without video id is skipped");
        assert_eq!(playlist.tracks[0].video_id, "vid1");
        assert_eq!(playlist.tracks[1].video_id, "vid2");
        assert_eq!(playlist.tracks[0].title, "First Song");
    }

    #[test]
    fn test_parse_artists_from_linked_runs() {
        let playlist = Playlist::from_browse_response(&browse_response(), "PLtest").unwrap();

        assert_eq!(playlist.tracks[0].artists, vec!["Artist One", "Second Artist"]);
        assert_eq!(
            playlist.tracks[0].artists_display(),
            "Artist One, Second Artist"
        );
    }

    #[test]
    fn test_track_thumbnail_prefers_largest() {
        let playlist = Playlist::from_browse_response(&browse_response(), "PLtest").unwrap();
        assert_eq!(
            playlist.tracks[0].thumbnail_url.as_deref(),
            Some("https://img/large.jpg")
        );
    }

    #[test]
    fn test_response_without_shelf_is_an_error() {
        let err = Playlist::from_browse_response(&json!({"contents": {}}), "PLtest").unwrap_err();
        assert!(matches!(err, YtMusicError::Parse(_)));
    }

    #[test]
    fn test_detail_header_author_fallback() {
        let response = json!({
            "contents": {"musicPlaylistShelfRenderer": {"contents": []}},
            "header": {"musicDetailHeaderRenderer": {
                "title": {"runs": [{"text": "Old Header"}]},
                "subtitle": {"runs": [
                    {"text": "Playlist"},
                    {"text": " • "},
                    {"text": "Legacy Author", "navigationEndpoint": {"browseEndpoint": {}}},
                    {"text": " • "},
                    {"text": "2024"}
                ]}
            }}
        });
        let playlist = Playlist::from_browse_response(&response, "PLtest").unwrap();

        assert_eq!(playlist.title, "Old Header");
        assert_eq!(playlist.author, "Legacy Author");
        assert!(playlist.tracks.is_empty());
    }

    #[test]
    fn test_parse_track_count_variants() {
        assert_eq!(parse_track_count("42 songs"), Some(42));
        assert_eq!(parse_track_count("1,234 songs • 80 hours"), Some(1234));
        assert_eq!(parse_track_count("no digits here"), None);
    }
}
