//! SQLite-backed subscriber registry

use crate::track::PlaylistId;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// One subscriber record
///
/// Subscribers are created on first activation and deactivated rather than
/// erased on opt-out, so a playlist override survives an unsubscribe and is
/// restored when the subscriber comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    /// Opaque chat identity the messaging transport delivers to
    pub chat_id: i64,
    /// Whether the subscriber currently receives notifications
    pub active: bool,
    /// Subscriber-specific playlist, when set
    pub playlist_override: Option<PlaylistId>,
}

impl Subscriber {
    /// A record for a chat the registry has never seen
    pub fn unknown(chat_id: i64) -> Self {
        Self {
            chat_id,
            active: false,
            playlist_override: None,
        }
    }

    /// The playlist this subscriber is bound to
    pub fn tracked_key(&self, default: &PlaylistId) -> PlaylistId {
        self.playlist_override
            .clone()
            .unwrap_or_else(|| default.clone())
    }
}

/// Tracks which subscribers are active and which playlist each one watches
///
/// Every mutation is a single SQL statement, so registry updates stay
/// atomic relative to a concurrently running check cycle that reads the
/// registry to resolve its recipients.
#[derive(Clone)]
pub struct SubscriberRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SubscriberRegistry {
    /// Opens (and creates if needed) the registry
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
            "CREATE TABLE IF NOT EXISTS subscribers (
                chat_id INTEGER PRIMARY KEY,
                active INTEGER NOT NULL DEFAULT 0,
                playlist_override TEXT
            )",
            [],
        )
        .map_err(|e| Error::persist(format!("Failed to create subscribers table: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Marks a subscriber active, creating the record on first activation
    ///
    /// Idempotent; an existing playlist override is preserved.
    pub async fn activate(&self, chat_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO subscribers (chat_id, active, playlist_override)
             VALUES (?1, 1, (SELECT playlist_override FROM subscribers WHERE chat_id = ?1))",
            params![chat_id],
        )
        .map_err(|e| Error::persist(format!("Failed to activate subscriber: {}", e)))?;
        Ok(())
    }

    /// Marks a subscriber inactive
    ///
    /// Idempotent; the playlist override is preserved for a future
    /// reactivation. Unknown subscribers are left unrecorded.
    pub async fn deactivate(&self, chat_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE subscribers SET active = 0 WHERE chat_id = ?1",
            params![chat_id],
        )
        .map_err(|e| Error::persist(format!("Failed to deactivate subscriber: {}", e)))?;
        Ok(())
    }

    /// Binds a subscriber-specific playlist
    ///
    /// Creates the record (inactive) when the subscriber was never seen, so
    /// a playlist can be chosen before subscribing.
    pub async fn set_override(&self, chat_id: i64, playlist: &PlaylistId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO subscribers (chat_id, active, playlist_override)
             VALUES (?1, COALESCE((SELECT active FROM subscribers WHERE chat_id = ?1), 0), ?2)",
            params![chat_id, playlist.as_str()],
        )
        .map_err(|e| Error::persist(format!("Failed to set playlist override: {}", e)))?;
        Ok(())
    }

    /// Removes a subscriber's playlist override
    ///
    /// The subscriber follows the process-wide default playlist again.
    pub async fn clear_override(&self, chat_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE subscribers SET playlist_override = NULL WHERE chat_id = ?1",
            params![chat_id],
        )
        .map_err(|e| Error::persist(format!("Failed to clear playlist override: {}", e)))?;
        Ok(())
    }

    /// Returns the record for a chat, or `None` when never seen
    pub async fn get(&self, chat_id: i64) -> Result<Option<Subscriber>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT chat_id, active, playlist_override FROM subscribers WHERE chat_id = ?1",
            params![chat_id],
            Self::row_to_subscriber,
        )
        .optional()
        .map_err(|e| Error::persist(format!("Failed to load subscriber: {}", e)))
    }

    /// All currently active subscribers
    pub async fn list_active(&self) -> Result<Vec<Subscriber>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT chat_id, active, playlist_override FROM subscribers
                 WHERE active = 1 ORDER BY chat_id ASC",
            )
            .map_err(|e| Error::persist(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map([], Self::row_to_subscriber)
            .map_err(|e| Error::persist(format!("Failed to query subscribers: {}", e)))?;

        let mut subscribers = Vec::new();
        for row in rows {
            subscribers
                .push(row.map_err(|e| Error::persist(format!("Failed to read subscriber: {}", e)))?);
        }
        Ok(subscribers)
    }

    /// Whether any subscriber other than `excluding_chat` has this playlist
    /// as its override
    ///
    /// Inactive subscribers count too: their override survives an
    /// unsubscribe, and dropping the baseline under them would silently
    /// re-initialize their tracking on resubscribe.
    pub async fn override_in_use(
        &self,
        playlist: &PlaylistId,
        excluding_chat: i64,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM subscribers
                 WHERE playlist_override = ?1 AND chat_id != ?2",
                params![playlist.as_str(), excluding_chat],
                |row| row.get(0),
            )
            .map_err(|e| Error::persist(format!("Failed to count override users: {}", e)))?;
        Ok(count > 0)
    }

    /// The playlist a chat is bound to: its override when set, else the
    /// process-wide default
    pub async fn resolve_tracked_key(
        &self,
        chat_id: i64,
        default: &PlaylistId,
    ) -> Result<PlaylistId> {
        Ok(self
            .get(chat_id)
            .await?
            .and_then(|s| s.playlist_override)
            .unwrap_or_else(|| default.clone()))
    }

    fn row_to_subscriber(row: &rusqlite::Row<'_>) -> rusqlite::Result<Subscriber> {
        let chat_id: i64 = row.get(0)?;
        let active: i64 = row.get(1)?;
        let playlist_override: Option<String> = row.get(2)?;

        Ok(Subscriber {
            chat_id,
            active: active != 0,
            playlist_override: playlist_override.map(PlaylistId::from_stored),
        })
    }
}
