//! Implementation of the wttracker `TrackSource` trait
//!
//! Gated behind the `tracker` feature so the client stays usable as a
//! standalone YouTube Music library. The tracking engine consumes the
//! client through this adapter without knowing anything about youtubei.

use crate::client::YtMusicClient;
use crate::models::Playlist;
use tracing::debug;
use wttracker::{PlaylistId, PlaylistMeta, Snapshot, Track, TrackSource};

impl From<Playlist> for Snapshot {
    fn from(playlist: Playlist) -> Self {
        let tracks = playlist
            .tracks
            .into_iter()
            .map(|t| {
                let artists = t.artists_display();
                let mut track = Track::new(t.video_id, t.title, artists);
                if let Some(url) = t.thumbnail_url {
                    track = track.with_thumbnail(url);
                }
                track
            })
            .collect();

        Snapshot::new(
            tracks,
            PlaylistMeta {
                title: playlist.title,
                author: playlist.author,
                track_count: playlist.track_count,
                thumbnail_url: playlist.thumbnail_url,
            },
        )
    }
}

#[async_trait::async_trait]
impl TrackSource for YtMusicClient {
    async fn fetch(&self, playlist: &PlaylistId) -> wttracker::Result<Snapshot> {
        let playlist = self
            .fetch_playlist(playlist.as_str())
            .await
            .map_err(|e| wttracker::Error::fetch(e.to_string()))?;

        debug!(
            playlist = %playlist.id,
            tracks = playlist.tracks.len(),
            "Fetched playlist snapshot"
        );
        Ok(playlist.into())
    }
}
