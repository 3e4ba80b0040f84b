//! Category catalog.
//!
//! The fixed set of category labels offered when adding a location, each
//! with a hint describing what belongs in the `details` field.

use serde::{Deserialize, Serialize};

/// One category label and its details hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Label stored in the record's `category` field.
    pub label: String,

    /// Example text for the `details` field.
    #[serde(default)]
    pub details_hint: String,
}

impl Category {
    /// Create a category.
    #[must_use]
    pub fn new(label: impl Into<String>, details_hint: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            details_hint: details_hint.into(),
        }
    }
}

/// The set of categories offered to the user, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Categories in display order.
    pub categories: Vec<Category>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            categories: vec![
                Category::new(
                    "Jelajah Wisata",
                    "Contoh: Jam buka, harga tiket, fasilitas...",
                ),
                Category::new(
                    "Akses Kampus & Fasilitas",
                    "Contoh: Jam operasional, biaya, detail kontak...",
                ),
                Category::new(
                    "Kuliner & Nugas",
                    "Contoh: Menu andalan, kisaran harga, kecepatan WiFi...",
                ),
            ],
        }
    }
}

impl Catalog {
    /// Labels in display order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.label.as_str())
    }

    /// Whether `label` is one of the catalog's categories (exact match).
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Look up a category by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.label == label)
    }

    /// The details hint for `label`, if it is known and has one.
    #[must_use]
    pub fn details_hint(&self, label: &str) -> Option<&str> {
        self.get(label)
            .map(|c| c.details_hint.as_str())
            .filter(|hint| !hint.is_empty())
    }

    /// Number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Whether the catalog has no categories.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
