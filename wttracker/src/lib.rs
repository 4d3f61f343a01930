//! # wttracker - Playlist change tracking engine
//!
//! This crate watches an externally hosted playlist for membership changes
//! and turns them into notifications for subscribers. It provides:
//! - Snapshot persistence per tracked playlist (SQLite)
//! - Pure snapshot comparison by track identity
//! - A subscriber registry with per-subscriber playlist overrides
//! - A notification dispatcher with artwork enrichment, rate limiting and
//!   per-recipient failure isolation
//! - A cycle scheduler serializing checks per tracked playlist
//!
//! The engine is transport-agnostic: fetching playlists, downloading artwork
//! and delivering messages go through the [`TrackSource`], [`ArtworkFetch`]
//! and [`MessageSink`] traits, implemented elsewhere.
//!
//! # Architecture
//!
//! - **SnapshotStore**: last successfully observed snapshot per playlist
//! - **SubscriberRegistry**: who is subscribed, and to which playlist
//! - **compare()**: membership diff between two snapshots
//! - **Dispatcher**: ordered, paced delivery of change notifications
//! - **PlaylistWatcher**: periodic and on-demand check cycles
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wttracker::{
//!     Dispatcher, DispatchPolicy, PlaylistId, PlaylistWatcher, SnapshotStore,
//!     SubscriberRegistry, WatcherConfig,
//! };
//! # use wttracker::{ArtworkFetch, MessageSink, TrackSource};
//! # async fn example(
//! #     source: Arc<dyn TrackSource>,
//! #     artwork: Arc<dyn ArtworkFetch>,
//! #     sink: Arc<dyn MessageSink>,
//! # ) -> wttracker::Result<()> {
//! let store = SnapshotStore::new("state/watchtracks.db".as_ref())?;
//! let registry = SubscriberRegistry::new("state/watchtracks.db".as_ref())?;
//! let dispatcher = Dispatcher::new(sink, artwork, DispatchPolicy::default());
//!
//! let config = WatcherConfig::new(PlaylistId::parse("PLabcdefghijklmnopqrstuvwxyz")?)
//!     .check_interval(Duration::from_secs(120));
//! let watcher = PlaylistWatcher::new(source, store, registry, dispatcher, config);
//!
//! watcher.subscribe(42).await?;
//! watcher.spawn_periodic();
//! # Ok(())
//! # }
//! ```

mod diff;
mod error;
mod notify;
mod registry;
mod source;
mod store;
mod track;
mod watcher;

// Public re-exports
pub use diff::{Changes, compare};
pub use error::{Error, Result};
pub use notify::{DeliveryReport, DispatchPolicy, Dispatcher, render_initialized, render_summary};
pub use registry::{Subscriber, SubscriberRegistry};
pub use source::{ArtworkFetch, MessageSink, TrackSource};
pub use store::SnapshotStore;
pub use track::{PlaylistId, PlaylistMeta, Snapshot, Track};
pub use watcher::{CycleOutcome, PlaylistWatcher, TrackerStatus, WatcherConfig};
