//! Device location for filling in a draft's coordinates.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::editor::RecordDraft;
use crate::error::{Error, Result};

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Location access granted.
    Granted,
    /// Location access refused.
    Denied,
}

/// A one-shot position fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters, when known.
    pub accuracy: Option<f64>,
}

/// Source of the device's current position.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Ask for (or check) permission to read the location.
    async fn request_permission(&self) -> PermissionStatus;

    /// Get the current position.
    ///
    /// # Errors
    ///
    /// Returns an error if no fix can be obtained.
    async fn current_position(&self) -> Result<Position>;
}

/// Write the device's current position into `draft`.
///
/// Latitude and longitude keep full precision; accuracy is written with two
/// decimals, or left empty when the fix has none.
///
/// # Errors
///
/// Returns [`Error::LocationPermissionDenied`] if permission is refused and
/// [`Error::LocationUnavailable`] if no fix could be obtained. The draft is
/// untouched on error.
pub async fn fill_from_device(
    draft: &mut RecordDraft,
    provider: &dyn LocationProvider,
) -> Result<Position> {
    if provider.request_permission().await == PermissionStatus::Denied {
        return Err(Error::LocationPermissionDenied);
    }

    let position = match provider.current_position().await {
        Ok(position) => position,
        Err(e @ Error::LocationUnavailable(_)) => return Err(e),
        Err(e) => return Err(Error::location_unavailable(e.to_string())),
    };
    debug!(?position, "Got position fix");

    draft.latitude = position.latitude.to_string();
    draft.longitude = position.longitude.to_string();
    draft.accuracy = position
        .accuracy
        .map(|a| format!("{a:.2}"))
        .unwrap_or_default();
    info!(
        latitude = position.latitude,
        longitude = position.longitude,
        "Filled coordinates from device"
    );
    Ok(position)
}

/// A provider that always reports the same position.
///
/// With no position configured it behaves like a device without a fix.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation {
    position: Option<Position>,
}

impl FixedLocation {
    /// A provider reporting `position`.
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position: Some(position),
        }
    }

    /// A provider with no position.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<Position> {
        self.position
            .ok_or_else(|| Error::location_unavailable("no position configured"))
    }
}
