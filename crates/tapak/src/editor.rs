//! Record write operations: create, update and confirmed delete.

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::record::{LocationRecord, RecordFields};
use crate::store::RemoteStore;

/// Form values for a record, as entered (all text).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    /// Display name (required).
    pub name: String,
    /// Description (required).
    pub description: String,
    /// Category label (required).
    pub category: Option<String>,
    /// Latitude text (required).
    pub latitude: String,
    /// Longitude text.
    pub longitude: String,
    /// Accuracy in meters.
    pub accuracy: String,
    /// Category-specific details.
    pub details: String,
}

impl RecordDraft {
    /// Pre-fill a draft from an existing record.
    ///
    /// Coordinates are split at the first comma; anything else lands in
    /// `latitude` so no text is lost.
    #[must_use]
    pub fn from_record(record: &LocationRecord) -> Self {
        let fields = &record.fields;
        let coordinates = fields.coordinates.as_deref().unwrap_or_default();
        let (latitude, longitude) = coordinates.split_once(',').unwrap_or((coordinates, ""));
        Self {
            name: fields.name.clone(),
            description: fields.description.clone(),
            category: fields.category.clone(),
            latitude: latitude.trim().to_string(),
            longitude: longitude.trim().to_string(),
            accuracy: fields.accuracy.clone().unwrap_or_default(),
            details: fields.details.clone().unwrap_or_default(),
        }
    }

    /// Check required fields and build the stored fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFields`] listing every empty required field.
    pub fn validate(&self) -> Result<RecordFields> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("name");
        }
        if is_blank(&self.description) {
            missing.push("description");
        }
        if self.category.as_deref().map_or(true, is_blank) {
            missing.push("category");
        }
        if is_blank(&self.latitude) {
            missing.push("latitude");
        }
        if !missing.is_empty() {
            return Err(Error::MissingFields { fields: missing });
        }

        Ok(RecordFields {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            coordinates: Some(format!(
                "{},{}",
                self.latitude.trim(),
                self.longitude.trim()
            )),
            accuracy: format_accuracy(&self.accuracy),
            details: non_blank(&self.details),
        })
    }

    /// The catalog's hint for the details field, while it is still empty.
    #[must_use]
    pub fn details_hint<'c>(&self, catalog: &'c Catalog) -> Option<&'c str> {
        if !is_blank(&self.details) {
            return None;
        }
        catalog.details_hint(self.category.as_deref()?)
    }
}

/// Two-decimal accuracy when the text is numeric, verbatim otherwise,
/// absent when empty.
fn format_accuracy(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Some(format!("{value:.2}")),
        _ => Some(text.to_string()),
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn non_blank(text: &str) -> Option<String> {
    (!is_blank(text)).then(|| text.to_string())
}

/// The question shown before a delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    /// Dialog title.
    pub title: String,
    /// Dialog body, including the warning that this cannot be undone.
    pub message: String,
    /// Id of the record about to be deleted.
    pub id: String,
}

impl DeletePrompt {
    fn for_record(id: &str, name: Option<&str>) -> Self {
        let subject = name.map_or_else(|| "this location".to_string(), |n| format!("\"{n}\""));
        Self {
            title: "Delete location".to_string(),
            message: format!("Delete {subject}? This cannot be undone."),
            id: id.to_string(),
        }
    }
}

/// Asks the user to confirm a destructive action.
pub trait Confirmer: Send + Sync {
    /// Return `true` to go ahead.
    fn confirm(&self, prompt: &DeletePrompt) -> bool;
}

/// Confirms without asking (`--yes`).
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm(&self, _prompt: &DeletePrompt) -> bool {
        true
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The record was removed.
    Deleted,
    /// The user declined; nothing was sent to the store.
    Cancelled,
}

/// Writes records to one collection of a store.
#[derive(Clone, Copy)]
pub struct RecordEditor<'a> {
    store: &'a dyn RemoteStore,
    path: &'a str,
    catalog: Option<&'a Catalog>,
}

impl std::fmt::Debug for RecordEditor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordEditor")
            .field("store", &self.store.name())
            .field("path", &self.path)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl<'a> RecordEditor<'a> {
    /// Create an editor for the collection at `path`.
    #[must_use]
    pub fn new(store: &'a dyn RemoteStore, path: &'a str) -> Self {
        Self {
            store,
            path,
            catalog: None,
        }
    }

    /// Warn when a saved category is not in `catalog`.
    #[must_use]
    pub fn with_catalog(mut self, catalog: &'a Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Load one record for editing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has this id, or a store
    /// error if the read fails.
    pub async fn load(&self, id: &str) -> Result<LocationRecord> {
        let snapshot = self.store.fetch(self.path).await?;
        snapshot.record(id).ok_or_else(|| Error::NotFound {
            id: id.to_string(),
        })
    }

    /// Validate `draft` and append it as a new record.
    ///
    /// Returns the store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any store call, or a store error.
    pub async fn create(&self, draft: &RecordDraft) -> Result<String> {
        let fields = self.prepare(draft)?;
        let id = self.store.append(self.path, &fields).await?;
        info!(id = %id, name = %fields.name, "Created location");
        Ok(id)
    }

    /// Validate `draft` and overwrite the whole record at `id`.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any store call, or a store error.
    pub async fn update(&self, id: &str, draft: &RecordDraft) -> Result<()> {
        let fields = self.prepare(draft)?;
        self.store.set(self.path, id, &fields).await?;
        info!(id, name = %fields.name, "Updated location");
        Ok(())
    }

    /// Delete the record at `id` after confirmation.
    ///
    /// `name` is only used in the prompt text.
    ///
    /// # Errors
    ///
    /// Returns a store error if the delete fails.
    pub async fn delete(
        &self,
        id: &str,
        name: Option<&str>,
        confirmer: &dyn Confirmer,
    ) -> Result<DeleteOutcome> {
        let prompt = DeletePrompt::for_record(id, name);
        if !confirmer.confirm(&prompt) {
            debug!(id, "Delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        self.store.delete(self.path, id).await?;
        info!(id, "Deleted location");
        Ok(DeleteOutcome::Deleted)
    }

    fn prepare(&self, draft: &RecordDraft) -> Result<RecordFields> {
        let fields = draft.validate()?;
        if let (Some(catalog), Some(category)) = (self.catalog, fields.category.as_deref()) {
            if !catalog.contains(category) {
                warn!(category, "Category is not in the catalog");
            }
        }
        Ok(fields)
    }
}
