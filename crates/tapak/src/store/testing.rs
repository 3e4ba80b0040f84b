//! Test doubles for code that talks to a [`RemoteStore`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{RemoteStore, SqliteStore, StoreError, Subscription};
use crate::record::RecordFields;

/// An in-memory store that counts calls and can be told to fail.
#[derive(Debug)]
pub struct RecordingStore {
    inner: SqliteStore,
    subscribes: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
    fail_subscribe: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().expect("in-memory store"),
            subscribes: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_subscribe: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &SqliteStore {
        &self.inner
    }

    /// Calls to `subscribe` (including failed ones).
    pub fn subscribe_calls(&self) -> usize {
        self.subscribes.load(Ordering::SeqCst)
    }

    /// Calls to `append`, `set` and `delete` (including failed ones).
    pub fn write_calls(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("simulated write failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::unavailable("simulated subscribe failure"));
        }
        self.inner.subscribe(path).await
    }

    async fn append(&self, path: &str, fields: &RecordFields) -> Result<String, StoreError> {
        self.write_guard()?;
        self.inner.append(path, fields).await
    }

    async fn set(&self, path: &str, id: &str, fields: &RecordFields) -> Result<(), StoreError> {
        self.write_guard()?;
        self.inner.set(path, id, fields).await
    }

    async fn delete(&self, path: &str, id: &str) -> Result<(), StoreError> {
        self.write_guard()?;
        self.inner.delete(path, id).await
    }
}

/// Record fields with the given name and category and a fixed description.
pub fn fields(name: &str, category: Option<&str>, coordinates: Option<&str>) -> RecordFields {
    RecordFields {
        name: name.to_string(),
        description: format!("About {name}"),
        category: category.map(str::to_string),
        coordinates: coordinates.map(str::to_string),
        accuracy: None,
        details: None,
    }
}
