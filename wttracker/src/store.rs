//! SQLite persistence for observed playlist snapshots

use crate::track::{PlaylistId, PlaylistMeta, Snapshot, Track};
use crate::{Error, Result};
use chrono::DateTime;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persists the last successfully observed snapshot per playlist
///
/// Reads and writes go through one connection behind a mutex, and writes
/// replace a playlist's rows inside a single transaction, so a reader never
/// observes a partially written snapshot. Absence of a snapshot is the
/// valid "never observed" state, not an error.
#[derive(Clone)]
pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotStore {
    /// Opens (and creates if needed) the snapshot store
    ///
    /// The parent directory and the tables are created on first use.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::persist(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::persist(format!("Failed to open database: {}", e)))?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| Error::persist(format!("Failed to set busy timeout: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshots (
                playlist_id TEXT PRIMARY KEY,
                fetched_at INTEGER NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                track_count INTEGER,
                thumbnail_url TEXT
            )",
            [],
        )
        .map_err(|e| Error::persist(format!("Failed to create snapshots table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS snapshot_tracks (
                playlist_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                video_id TEXT NOT NULL,
                title TEXT NOT NULL,
                artists TEXT NOT NULL,
                thumbnail_url TEXT,
                PRIMARY KEY (playlist_id, position)
            )",
            [],
        )
        .map_err(|e| Error::persist(format!("Failed to create snapshot_tracks table: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_snapshot_tracks_playlist
             ON snapshot_tracks(playlist_id, position)",
            [],
        )
        .map_err(|e| Error::persist(format!("Failed to create index: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Loads the stored snapshot for a playlist, or `None` when the
    /// playlist was never observed
    pub async fn load(&self, key: &PlaylistId) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT fetched_at, title, author, track_count, thumbnail_url
                 FROM snapshots WHERE playlist_id = ?1",
            )
            .map_err(|e| Error::persist(format!("Failed to prepare statement: {}", e)))?;

        let result = stmt.query_row(params![key.as_str()], |row| {
            let fetched_at: i64 = row.get(0)?;
            let title: String = row.get(1)?;
            let author: String = row.get(2)?;
            let track_count: Option<i64> = row.get(3)?;
            let thumbnail_url: Option<String> = row.get(4)?;

            Ok((
                fetched_at,
                PlaylistMeta {
                    title,
                    author,
                    track_count: track_count.map(|c| c.max(0) as u64),
                    thumbnail_url,
                },
            ))
        });

        let (fetched_at, meta) = match result {
            Ok(data) => data,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(Error::persist(format!("Failed to load snapshot: {}", e))),
        };

        let mut stmt = conn
            .prepare(
                "SELECT video_id, title, artists, thumbnail_url
                 FROM snapshot_tracks WHERE playlist_id = ?1 ORDER BY position ASC",
            )
            .map_err(|e| Error::persist(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map(params![key.as_str()], |row| {
                Ok(Track {
                    video_id: row.get(0)?,
                    title: row.get(1)?,
                    artists: row.get(2)?,
                    thumbnail_url: row.get(3)?,
                })
            })
            .map_err(|e| Error::persist(format!("Failed to query tracks: {}", e)))?;

        let mut tracks = Vec::new();
        for row in rows {
            tracks.push(row.map_err(|e| Error::persist(format!("Failed to read track: {}", e)))?);
        }

        Ok(Some(Snapshot {
            tracks,
            meta,
            fetched_at: DateTime::from_timestamp(fetched_at, 0).unwrap_or_default(),
        }))
    }

    /// Returns the stored snapshot for a playlist, or the empty snapshot
    /// when the playlist was never observed
    pub async fn get(&self, key: &PlaylistId) -> Result<Snapshot> {
        Ok(self.load(key).await?.unwrap_or_default())
    }

    /// Replaces the stored snapshot for a playlist
    ///
    /// Metadata upsert, old row deletion and track insertion run in one
    /// transaction: on failure the store keeps whatever it last
    /// successfully wrote, and the next cycle diffs against that baseline.
    pub async fn put(&self, key: &PlaylistId, snapshot: &Snapshot) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();

        let tx = conn
            .transaction()
            .map_err(|e| Error::persist(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO snapshots
             (playlist_id, fetched_at, title, author, track_count, thumbnail_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.as_str(),
                snapshot.fetched_at.timestamp(),
                snapshot.meta.title,
                snapshot.meta.author,
                snapshot.meta.track_count.map(|c| c as i64),
                snapshot.meta.thumbnail_url,
            ],
        )
        .map_err(|e| Error::persist(format!("Failed to save snapshot: {}", e)))?;

        tx.execute(
            "DELETE FROM snapshot_tracks WHERE playlist_id = ?1",
            params![key.as_str()],
        )
        .map_err(|e| Error::persist(format!("Failed to delete old tracks: {}", e)))?;

        for (position, track) in snapshot.tracks.iter().enumerate() {
            tx.execute(
                "INSERT INTO snapshot_tracks
                 (playlist_id, position, video_id, title, artists, thumbnail_url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key.as_str(),
                    position as i64,
                    track.video_id,
                    track.title,
                    track.artists,
                    track.thumbnail_url,
                ],
            )
            .map_err(|e| Error::persist(format!("Failed to insert track: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::persist(format!("Failed to commit snapshot: {}", e)))
    }

    /// Drops the stored snapshot for a playlist
    ///
    /// The next observation of the playlist is treated as a first
    /// observation again.
    pub async fn forget(&self, key: &PlaylistId) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();

        let tx = conn
            .transaction()
            .map_err(|e| Error::persist(format!("Failed to start transaction: {}", e)))?;

        tx.execute(
            "DELETE FROM snapshot_tracks WHERE playlist_id = ?1",
            params![key.as_str()],
        )
        .map_err(|e| Error::persist(format!("Failed to delete tracks: {}", e)))?;

        tx.execute(
            "DELETE FROM snapshots WHERE playlist_id = ?1",
            params![key.as_str()],
        )
        .map_err(|e| Error::persist(format!("Failed to delete snapshot: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::persist(format!("Failed to commit deletion: {}", e)))
    }
}
