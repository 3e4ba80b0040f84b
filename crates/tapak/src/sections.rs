//! Grouping of records into category sections, and search filtering.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::LocationRecord;
use crate::store::Snapshot;

/// A named group of records sharing a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Category label.
    pub title: String,
    /// Records in snapshot order.
    pub data: Vec<LocationRecord>,
}

/// Group a snapshot's records by category.
///
/// Every record lands in exactly one section; records without a category go
/// to `"Uncategorized"`. Sections are sorted by title (byte order) and keep
/// snapshot order inside.
#[must_use]
pub fn group_into_sections(snapshot: &Snapshot) -> Vec<Section> {
    group_records(snapshot.records())
}

/// Group already-decoded records; see [`group_into_sections`].
#[must_use]
pub fn group_records(records: impl IntoIterator<Item = LocationRecord>) -> Vec<Section> {
    let mut groups: BTreeMap<String, Vec<LocationRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.category_label().to_string())
            .or_default()
            .push(record);
    }
    groups
        .into_iter()
        .map(|(title, data)| Section { title, data })
        .collect()
}

/// Keep only records whose name, description or category contains `query`,
/// ignoring case, and drop sections left empty.
///
/// An empty query returns the sections unchanged.
#[must_use]
pub fn filter_sections(sections: &[Section], query: &str) -> Vec<Section> {
    if query.is_empty() {
        return sections.to_vec();
    }
    let query = query.to_lowercase();
    sections
        .iter()
        .filter_map(|section| {
            let data: Vec<_> = section
                .data
                .iter()
                .filter(|record| record.matches_lowercase(&query))
                .cloned()
                .collect();
            (!data.is_empty()).then(|| Section {
                title: section.title.clone(),
                data,
            })
        })
        .collect()
}

/// Total number of records across sections.
#[must_use]
pub fn record_count(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.data.len()).sum()
}
