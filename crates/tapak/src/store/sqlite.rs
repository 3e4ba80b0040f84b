//! Local document store on `SQLite`.
//!
//! Behaves like the hosted store from a subscriber's point of view: every
//! subscription gets the current snapshot immediately and a complete new
//! snapshot after each write that touches its collection.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{
    migrations, normalize_path, validate_id, PushIdGenerator, RemoteStore, Snapshot,
    SnapshotSender, StoreError, Subscription,
};
use crate::record::RecordFields;

/// `SQLite`-backed implementation of [`RemoteStore`].
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    /// Live subscribers, pruned lazily on broadcast.
    subscribers: Mutex<Vec<SnapshotSender>>,
    ids: PushIdGenerator,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema
    /// initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.clone(),
            source,
        })?;

        // WAL lets a second process read while this one writes.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self::from_connection(path, conn))
    }

    /// Create an in-memory store, used by tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::Open {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::from_connection(PathBuf::from(":memory:"), conn))
    }

    fn from_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
            subscribers: Mutex::new(Vec::new()),
            ids: PushIdGenerator::new(),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of subscriptions still attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers()
            .map(|mut subscribers| {
                subscribers.retain(|s| !s.is_closed());
                subscribers.len()
            })
            .unwrap_or(0)
    }

    /// Count documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the query fails.
    pub fn count(&self, path: &str) -> Result<i64, StoreError> {
        let collection = normalize_path(path)?;
        let conn = self.lock_conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [&collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::unavailable("database connection lock poisoned"))
    }

    fn lock_subscribers(&self) -> Result<MutexGuard<'_, Vec<SnapshotSender>>, StoreError> {
        self.subscribers
            .lock()
            .map_err(|_| StoreError::unavailable("subscriber list lock poisoned"))
    }

    fn load_snapshot(&self, collection: &str) -> Result<Snapshot, StoreError> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, body FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = Map::new();
        for (id, body) in rows {
            match serde_json::from_str::<Value>(&body) {
                Ok(value) => {
                    entries.insert(id, value);
                }
                Err(e) => warn!(collection, id = %id, error = %e, "Skipping undecodable document"),
            }
        }
        Ok(Snapshot::new(collection, entries))
    }

    /// Push the current snapshot of `collection` to its subscribers.
    fn broadcast(&self, collection: &str) -> Result<(), StoreError> {
        let mut subscribers = self.lock_subscribers()?;
        subscribers.retain(|s| !s.is_closed());

        if !subscribers.iter().any(|s| s.path() == collection) {
            return Ok(());
        }

        let snapshot = self.load_snapshot(collection)?;
        let before = subscribers.len();
        subscribers.retain(|s| s.path() != collection || s.send(Ok(snapshot.clone())));
        debug!(
            collection,
            delivered = subscribers.iter().filter(|s| s.path() == collection).count(),
            dropped = before - subscribers.len(),
            "Broadcast snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let collection = normalize_path(path)?;
        let (sender, subscription) = Subscription::channel(collection.clone());

        // Hold the subscriber list while reading so no write slips between
        // the initial snapshot and registration.
        let mut subscribers = self.lock_subscribers()?;
        let snapshot = self.load_snapshot(&collection)?;
        sender.send(Ok(snapshot));
        subscribers.push(sender);

        debug!(collection = %collection, "Subscribed");
        Ok(subscription)
    }

    async fn append(&self, path: &str, fields: &RecordFields) -> Result<String, StoreError> {
        let collection = normalize_path(path)?;
        let body = serde_json::to_string(fields)?;
        let now = Utc::now();
        let id = self.ids.next_id(now, body.as_bytes());

        self.lock_conn()?.execute(
            r"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
            params![collection, id, body, now.to_rfc3339()],
        )?;
        debug!(collection = %collection, id = %id, "Appended document");

        self.broadcast(&collection)?;
        Ok(id)
    }

    async fn set(&self, path: &str, id: &str, fields: &RecordFields) -> Result<(), StoreError> {
        let collection = normalize_path(path)?;
        validate_id(id)?;
        let body = serde_json::to_string(fields)?;

        self.lock_conn()?.execute(
            r"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            ",
            params![collection, id, body, Utc::now().to_rfc3339()],
        )?;
        debug!(collection = %collection, id, "Set document");

        self.broadcast(&collection)
    }

    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError> {
        let collection = normalize_path(path)?;
        validate_id(id)?;

        let affected = self.lock_conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;

        if affected == 0 {
            debug!(collection = %collection, id, "Delete of missing document");
            return Ok(());
        }
        debug!(collection = %collection, id, "Deleted document");
        self.broadcast(&collection)
    }
}
