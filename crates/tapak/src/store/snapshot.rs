//! Full-collection snapshots.

use serde_json::{Map, Value};
use tracing::warn;

use crate::record::LocationRecord;

/// The complete state of one collection at a point in time.
///
/// Entries keep the order the store delivered them in (key order for both
/// backends).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    path: String,
    entries: Map<String, Value>,
}

impl Snapshot {
    /// Create a snapshot from raw entries.
    #[must_use]
    pub fn new(path: impl Into<String>, entries: Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// A snapshot of an empty collection.
    #[must_use]
    pub fn empty(path: impl Into<String>) -> Self {
        Self::new(path, Map::new())
    }

    /// Collection path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of raw entries, including ones that are not valid records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw entries in delivery order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Decode every entry into a record, skipping entries that are not
    /// documents.
    #[must_use]
    pub fn records(&self) -> Vec<LocationRecord> {
        self.entries
            .iter()
            .filter_map(|(id, value)| match LocationRecord::from_entry(id, value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %self.path, id = %id, error = %e, "Skipping malformed record");
                    None
                }
            })
            .collect()
    }

    /// Decode a single record by id.
    #[must_use]
    pub fn record(&self, id: &str) -> Option<LocationRecord> {
        let value = self.entries.get(id)?;
        LocationRecord::from_entry(id, value).ok()
    }
}
