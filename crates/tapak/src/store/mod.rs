//! Remote store adapter.
//!
//! The [`RemoteStore`] trait is everything the rest of the crate needs from a
//! real-time document database: a live subscription to a collection plus
//! append, set and delete of single records. Two backends implement it:
//!
//! - [`SqliteStore`]: a local document store that pushes a fresh snapshot to
//!   every subscriber after each write.
//! - [`FirebaseStore`]: the hosted Firebase Realtime Database over its REST
//!   and event-stream API.
//!
//! Stores are constructed explicitly and passed down; nothing in the crate
//! holds a global handle.

pub mod firebase;
pub mod migrations;
mod push_id;
pub mod schema;
mod snapshot;
pub mod sqlite;
mod subscription;
#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::record::RecordFields;

pub use firebase::FirebaseStore;
pub use push_id::PushIdGenerator;
pub use snapshot::Snapshot;
pub use sqlite::SqliteStore;
pub use subscription::{SnapshotEvent, SnapshotSender, Subscription, SubscriptionHandle};

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to open or create the local database.
    #[error("failed to open database at {path}: {source}")]
    Open {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A local database query failed.
    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    Migration {
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to create the database directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An HTTP request to the hosted store failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The hosted store answered with a non-success status.
    #[error("store returned status {status} for {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Request URL.
        url: String,
    },

    /// A response or stored document could not be decoded.
    #[error("malformed store data: {0}")]
    Decode(String),

    /// The live subscription stream failed or was closed by the server.
    #[error("subscription stream failed: {0}")]
    Stream(String),

    /// A collection path or record id is not usable.
    #[error("invalid store path: {0:?}")]
    InvalidPath(String),

    /// The store cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a stream error.
    #[must_use]
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream(message.into())
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A real-time document store holding collections of records.
///
/// Paths name a collection (for example `points`); ids name a record inside
/// it. Every write is all-or-nothing for a single record.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Backend name, for logs and status output.
    fn name(&self) -> &'static str;

    /// Open a live subscription to the whole collection at `path`.
    ///
    /// The first event is the current state; every later change delivers a
    /// complete new snapshot. Dropping the returned [`Subscription`] ends it.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription cannot be established.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Append a record; the store assigns and returns its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn append(&self, path: &str, fields: &RecordFields) -> Result<String, StoreError>;

    /// Overwrite the record at `id` with `fields`. Fields not present in
    /// `fields` are gone afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    async fn set(&self, path: &str, id: &str, fields: &RecordFields) -> Result<(), StoreError>;

    /// Remove the record at `id`. Removing a missing id is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError>;

    /// Read the collection once.
    ///
    /// # Errors
    ///
    /// Returns an error if the subscription fails or ends before the first
    /// snapshot.
    async fn fetch(&self, path: &str) -> Result<Snapshot, StoreError> {
        let mut subscription = self.subscribe(path).await?;
        match subscription.next().await {
            Some(event) => event,
            None => Err(StoreError::stream(
                "subscription closed before the first snapshot",
            )),
        }
    }
}

/// Normalize a collection path: strip surrounding slashes and reject
/// characters the hosted store does not allow in keys.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPath`] for empty or unusable paths.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| !is_valid_key(segment)) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}

/// Check a record id before it is used to address a document.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPath`] if the id is empty or contains
/// reserved characters.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    if is_valid_key(id) {
        Ok(())
    } else {
        Err(StoreError::InvalidPath(id.to_string()))
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key
            .chars()
            .any(|c| matches!(c, '.' | '#' | '$' | '[' | ']' | '/') || c.is_control())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("points").unwrap(), "points");
        assert_eq!(normalize_path("/points/").unwrap(), "points");
        assert_eq!(normalize_path("city/points").unwrap(), "city/points");
    }

    #[test]
    fn test_normalize_path_rejects_bad_paths() {
        assert!(normalize_path("").is_err());
        assert!(normalize_path("/").is_err());
        assert!(normalize_path("po.ints").is_err());
        assert!(normalize_path("a//b").is_err());
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("-NbC123").is_ok());
        assert!(validate_id("").is_err());
        assert!(validate_id("a/b").is_err());
        assert!(validate_id("a$b").is_err());
    }

    #[test]
    fn test_store_error_display() {
        assert!(StoreError::unavailable("offline")
            .to_string()
            .contains("offline"));
        assert!(StoreError::stream("closed").to_string().contains("closed"));
        let err = StoreError::Status {
            status: 401,
            url: "https://example.firebaseio.com/points.json".to_string(),
        };
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_from_json_error() {
        let err: StoreError = serde_json::from_str::<i32>("nope").unwrap_err().into();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}
