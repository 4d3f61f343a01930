//! # wtytmusic - YouTube Music browse client
//!
//! Read-only client for YouTube Music playlists, built on the internal
//! `youtubei/v1/browse` endpoint the web player uses.
//!
//! ## Features
//!
//! - **Playlist contents**: ordered tracks with titles, artists and
//!   thumbnails, plus playlist metadata (title, author, track count).
//! - **Permissive parsing**: renderers are located anywhere in the response
//!   tree, so frontend layout changes rarely break the client.
//! - **Optional authentication**: browser-export cookies with SAPISIDHASH
//!   signing give access to private playlists.
//! - **Tracker integration** (feature `tracker`): implements the
//!   `wttracker::TrackSource` trait.
//!
//! ## Example
//!
//! ```no_run
//! use wtytmusic::YtMusicClient;
//!
//! # async fn example() -> wtytmusic::Result<()> {
//! let client = YtMusicClient::new()?;
//! let playlist = client.fetch_playlist("PLabcdefghijklmnopqrstuvwxyz").await?;
//! for track in &playlist.tracks {
//!     println!("{} - {}", track.title, track.artists_display());
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod models;

#[cfg(feature = "tracker")]
mod tracker_impl;

pub use auth::BrowserAuth;
pub use client::{
    DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT, YtMusicClient,
    YtMusicClientBuilder,
};
pub use error::{Result, YtMusicError};
pub use models::{Playlist, PlaylistTrack};
