//! Check cycle scheduling
//!
//! One cycle is fetch → diff → dispatch → persist for a single tracked
//! playlist. Cycles for distinct playlists may run concurrently, but cycles
//! for the same playlist are serialized behind a per-playlist lock: the
//! store's read-diff-write sequence is not atomic, and two cycles racing on
//! the same playlist would both diff against the same stale baseline and
//! double-fire or drop notifications.

use crate::diff::{Changes, compare};
use crate::notify::Dispatcher;
use crate::registry::{Subscriber, SubscriberRegistry};
use crate::source::TrackSource;
use crate::store::SnapshotStore;
use crate::track::{PlaylistId, PlaylistMeta, Snapshot};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Default delay between two scheduled passes
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(120);

/// Default deadline for one full cycle
const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(90);

/// Default delay before the first scheduled pass
const DEFAULT_WARMUP: Duration = Duration::from_secs(10);

/// Watcher tuning
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    default_playlist: PlaylistId,
    check_interval: Duration,
    cycle_deadline: Duration,
    warmup: Duration,
}

impl WatcherConfig {
    /// Creates a configuration watching `default_playlist` for subscribers
    /// without a personal override
    pub fn new(default_playlist: PlaylistId) -> Self {
        Self {
            default_playlist,
            check_interval: DEFAULT_CHECK_INTERVAL,
            cycle_deadline: DEFAULT_CYCLE_DEADLINE,
            warmup: DEFAULT_WARMUP,
        }
    }

    /// Sets the delay between two scheduled passes
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Sets the deadline after which a cycle is abandoned without
    /// mutating the store
    pub fn cycle_deadline(mut self, deadline: Duration) -> Self {
        self.cycle_deadline = deadline;
        self
    }

    /// Sets the delay before the first scheduled pass
    pub fn warmup(mut self, warmup: Duration) -> Self {
        self.warmup = warmup;
        self
    }
}

/// What one check cycle concluded
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The playlist was observed for the first time; the snapshot was
    /// persisted and no notification was sent
    Initialized {
        /// Number of tracks now tracked
        track_count: usize,
    },
    /// Membership did not change
    NoChange,
    /// Membership changed and notifications were dispatched
    Changed(Changes),
}

/// Status snapshot for one subscriber, as shown by the status command
#[derive(Debug, Clone)]
pub struct TrackerStatus {
    /// Whether the chat currently receives notifications
    pub subscribed: bool,
    /// The playlist the chat is bound to
    pub tracked_key: PlaylistId,
    /// Whether that playlist is a personal override
    pub override_active: bool,
    /// Delay between two scheduled passes
    pub check_interval: Duration,
    /// Tracks in the last successfully observed snapshot
    pub tracked_count: usize,
    /// Metadata of the last observed snapshot, when one exists
    pub meta: Option<PlaylistMeta>,
    /// When the last observed snapshot was fetched
    pub last_checked: Option<DateTime<Utc>>,
}

/// Drives periodic and on-demand check cycles
///
/// Cloning is cheap and every clone shares the per-playlist locks, so a
/// manual check and a scheduled pass can never run a cycle for the same
/// playlist concurrently.
#[derive(Clone)]
pub struct PlaylistWatcher {
    source: Arc<dyn TrackSource>,
    store: SnapshotStore,
    registry: SubscriberRegistry,
    dispatcher: Dispatcher,
    config: WatcherConfig,
    locks: Arc<StdMutex<HashMap<PlaylistId, Arc<AsyncMutex<()>>>>>,
}

impl PlaylistWatcher {
    /// Creates a watcher over a track source, persistence and dispatch
    pub fn new(
        source: Arc<dyn TrackSource>,
        store: SnapshotStore,
        registry: SubscriberRegistry,
        dispatcher: Dispatcher,
        config: WatcherConfig,
    ) -> Self {
        Self {
            source,
            store,
            registry,
            dispatcher,
            config,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// The playlist watched for subscribers without an override
    pub fn default_playlist(&self) -> &PlaylistId {
        &self.config.default_playlist
    }

    /// The registry backing this watcher
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    // ========================================================================
    // Subscription operations (consumed by the command layer)
    // ========================================================================

    /// Subscribes a chat to change notifications
    pub async fn subscribe(&self, chat_id: i64) -> Result<()> {
        self.registry.activate(chat_id).await?;
        info!(chat_id, "Subscriber activated");
        Ok(())
    }

    /// Unsubscribes a chat; a playlist override survives for later
    pub async fn unsubscribe(&self, chat_id: i64) -> Result<()> {
        self.registry.deactivate(chat_id).await?;
        info!(chat_id, "Subscriber deactivated");
        Ok(())
    }

    /// Binds a chat to its own playlist
    ///
    /// The input may be a raw identifier or a playlist URL. The playlist is
    /// verified with one fetch before the override is stored. The stored
    /// snapshot of the chat's previous override is dropped only when this
    /// chat was its last tracker: the default playlist and any key another
    /// subscriber still follows keep their baselines, since dropping a
    /// shared baseline would silently re-initialize every other
    /// subscriber's diff.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the identifier is malformed, and
    /// [`Error::Fetch`] when the playlist cannot be fetched.
    pub async fn set_playlist_override(&self, chat_id: i64, input: &str) -> Result<PlaylistMeta> {
        let playlist = PlaylistId::parse(input)?;

        let snapshot = tokio::time::timeout(
            self.config.cycle_deadline,
            self.source.fetch(&playlist),
        )
        .await
        .map_err(|_| Error::Deadline(self.config.cycle_deadline))??;

        let previous = self
            .registry
            .get(chat_id)
            .await?
            .and_then(|r| r.playlist_override);
        if let Some(previous) = previous {
            if previous != playlist
                && previous != self.config.default_playlist
                && !self.registry.override_in_use(&previous, chat_id).await?
            {
                let lock = self.key_lock(&previous);
                let _guard = lock.lock().await;
                self.store.forget(&previous).await?;
            }
        }

        self.registry.set_override(chat_id, &playlist).await?;
        info!(chat_id, playlist = %playlist, "Playlist override set");
        Ok(snapshot.meta)
    }

    /// Removes a chat's playlist override; the chat follows the default
    /// playlist again
    pub async fn clear_playlist_override(&self, chat_id: i64) -> Result<()> {
        self.registry.clear_override(chat_id).await?;
        info!(chat_id, "Playlist override cleared");
        Ok(())
    }

    /// Drops the stored snapshot of a chat's tracked playlist
    ///
    /// The next check treats the playlist as never observed. Takes the
    /// playlist's cycle lock, so a cycle already in flight cannot undo the
    /// reset by persisting its snapshot afterwards.
    pub async fn reset_tracking(&self, chat_id: i64) -> Result<()> {
        let key = self
            .registry
            .resolve_tracked_key(chat_id, &self.config.default_playlist)
            .await?;
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;
        self.store.forget(&key).await?;
        info!(chat_id, playlist = %key, "Tracking state reset");
        Ok(())
    }

    /// The current tracking status of a chat
    ///
    /// Reads the stored snapshot without fetching, so a status query never
    /// turns into a network call.
    pub async fn status(&self, chat_id: i64) -> Result<TrackerStatus> {
        let record = self.registry.get(chat_id).await?;
        let subscribed = record.as_ref().is_some_and(|r| r.active);
        let override_active = record
            .as_ref()
            .is_some_and(|r| r.playlist_override.is_some());
        let tracked_key = record
            .and_then(|r| r.playlist_override)
            .unwrap_or_else(|| self.config.default_playlist.clone());

        let stored = self.store.load(&tracked_key).await?;
        Ok(TrackerStatus {
            subscribed,
            tracked_key,
            override_active,
            check_interval: self.config.check_interval,
            tracked_count: stored.as_ref().map_or(0, Snapshot::len),
            meta: stored.as_ref().map(|s| s.meta.clone()),
            last_checked: stored.map(|s| s.fetched_at),
        })
    }

    // ========================================================================
    // Check cycles
    // ========================================================================

    /// Runs one cycle for a chat's tracked playlist, now
    ///
    /// The caller is the only recipient of the per-track events. When a
    /// cycle for the same playlist is already running, this waits for it
    /// to finish instead of racing it.
    pub async fn check_now(&self, chat_id: i64) -> Result<CycleOutcome> {
        let key = self
            .registry
            .resolve_tracked_key(chat_id, &self.config.default_playlist)
            .await?;

        let recipient = self
            .registry
            .get(chat_id)
            .await?
            .unwrap_or_else(|| Subscriber::unknown(chat_id));

        debug!(chat_id, playlist = %key, "Manual check requested");
        self.run_cycle(&key, std::slice::from_ref(&recipient), false)
            .await
    }

    /// Runs one scheduled pass: one cycle per distinct tracked playlist of
    /// the active subscribers
    ///
    /// Cycle failures are logged per playlist and never abort the pass.
    pub async fn run_scheduled_pass(&self) -> Result<()> {
        let subscribers = self.registry.list_active().await?;
        if subscribers.is_empty() {
            debug!("No active subscribers, skipping scheduled pass");
            return Ok(());
        }

        // Group subscribers by the playlist they are bound to
        let mut by_key: HashMap<PlaylistId, Vec<Subscriber>> = HashMap::new();
        for subscriber in subscribers {
            let key = subscriber.tracked_key(&self.config.default_playlist);
            by_key.entry(key).or_default().push(subscriber);
        }

        for (key, recipients) in by_key {
            match self.run_cycle(&key, &recipients, true).await {
                Ok(CycleOutcome::Changed(changes)) => {
                    info!(
                        playlist = %key,
                        added = changes.added.len(),
                        removed = changes.removed.len(),
                        recipients = recipients.len(),
                        "Playlist changed"
                    );
                }
                Ok(CycleOutcome::Initialized { track_count }) => {
                    info!(playlist = %key, track_count, "Playlist observed for the first time");
                }
                Ok(CycleOutcome::NoChange) => {
                    debug!(playlist = %key, "No changes");
                }
                Err(e) => {
                    warn!(playlist = %key, error = %e, "Check cycle failed, will retry next pass");
                }
            }
        }
        Ok(())
    }

    /// Spawns the periodic driver task
    ///
    /// The first pass runs after the warm-up delay, then one pass per check
    /// interval. The task never stops on its own; cycle failures are logged
    /// and the next tick retries.
    pub fn spawn_periodic(&self) -> JoinHandle<()> {
        let watcher = self.clone();
        tokio::spawn(async move {
            info!(
                interval_secs = watcher.config.check_interval.as_secs(),
                playlist = %watcher.config.default_playlist,
                "Starting periodic playlist checks"
            );
            tokio::time::sleep(watcher.config.warmup).await;

            let mut ticker = tokio::time::interval(watcher.config.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = watcher.run_scheduled_pass().await {
                    error!(error = %e, "Scheduled pass failed");
                }
            }
        })
    }

    /// One full cycle for one playlist, serialized per playlist
    async fn run_cycle(
        &self,
        key: &PlaylistId,
        recipients: &[Subscriber],
        announce: bool,
    ) -> Result<CycleOutcome> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        tokio::time::timeout(
            self.config.cycle_deadline,
            self.cycle_inner(key, recipients, announce),
        )
        .await
        .map_err(|_| Error::Deadline(self.config.cycle_deadline))?
    }

    /// Fetch → diff → dispatch → persist, assuming the playlist lock is held
    async fn cycle_inner(
        &self,
        key: &PlaylistId,
        recipients: &[Subscriber],
        announce: bool,
    ) -> Result<CycleOutcome> {
        // A failed fetch aborts before any state is touched
        let new = self.source.fetch(key).await?;
        let old = self.store.get(key).await?;

        let changes = compare(&old, &new);

        if changes.initializing {
            // Same stance as the Changed path: a failed write is logged,
            // the playlist stays unobserved and the next cycle retries
            if let Err(e) = self.store.put(key, &new).await {
                error!(playlist = %key, error = %e, "Failed to persist initial snapshot");
            }
            return Ok(CycleOutcome::Initialized {
                track_count: new.len(),
            });
        }

        if changes.is_empty() {
            return Ok(CycleOutcome::NoChange);
        }

        let report = self.dispatcher.dispatch(&changes, recipients).await;
        if announce {
            self.dispatcher.announce_summary(&changes, recipients).await;
        }
        debug!(
            playlist = %key,
            delivered = report.delivered,
            failed = report.failed,
            "Dispatched change notifications"
        );

        // The computed snapshot already drove this cycle's notifications;
        // a failed write keeps the old baseline and the next cycle may
        // repeat the same diff, which at-least-once delivery accepts.
        if let Err(e) = self.store.put(key, &new).await {
            error!(playlist = %key, error = %e, "Failed to persist snapshot, keeping old baseline");
        }

        Ok(CycleOutcome::Changed(changes))
    }

    /// The serialization lock of one playlist
    fn key_lock(&self, key: &PlaylistId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(key.clone()).or_default().clone()
    }
}
