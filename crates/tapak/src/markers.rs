//! Map marker projection.

use serde::Serialize;
use tracing::warn;

use crate::record::Coordinates;
use crate::store::Snapshot;

/// A map pin for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    /// Record id.
    pub id: String,
    /// Record name, used as the pin title.
    pub name: String,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// Project every record with usable coordinates into a marker.
///
/// Records without coordinates are skipped silently; records whose
/// coordinates do not parse are skipped with a warning. Output keeps
/// snapshot order.
#[must_use]
pub fn project_markers(snapshot: &Snapshot) -> Vec<Marker> {
    snapshot
        .records()
        .into_iter()
        .filter_map(|record| {
            let text = record.fields.coordinates.as_deref()?;
            match Coordinates::parse(text) {
                Ok(coords) => Some(Marker {
                    name: record.fields.name,
                    id: record.id,
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                }),
                Err(_) => {
                    warn!(id = %record.id, coordinates = text, "Skipping record with malformed coordinates");
                    None
                }
            }
        })
        .collect()
}
