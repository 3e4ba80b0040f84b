//! Error types for tapak.
//!
//! This module defines the crate-wide error type. Store-level failures have
//! their own [`StoreError`] and are wrapped here so screens can show one
//! generic alert for every kind of remote failure.

use thiserror::Error;

use crate::store::StoreError;

/// The main error type for tapak operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// One or more required form fields are empty.
    #[error("missing required fields: {}", .fields.join(", "))]
    MissingFields {
        /// Names of the empty fields, in form order.
        fields: Vec<&'static str>,
    },

    /// A coordinate string could not be used.
    #[error("invalid coordinates: {value:?}")]
    InvalidCoordinates {
        /// The raw coordinate text.
        value: String,
    },

    // === Store Errors ===
    /// The remote store rejected or failed a request.
    #[error("store request failed: {0}")]
    Store(#[from] StoreError),

    /// No record exists with the given id.
    #[error("no record with id {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    // === Location Errors ===
    /// The user denied access to the device location.
    #[error("location permission denied")]
    LocationPermissionDenied,

    /// The device could not produce a position fix.
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },
}

/// A specialized Result type for tapak operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an invalid-coordinates error for the given text.
    #[must_use]
    pub fn invalid_coordinates(value: impl Into<String>) -> Self {
        Self::InvalidCoordinates {
            value: value.into(),
        }
    }

    /// Create a location-unavailable error.
    #[must_use]
    pub fn location_unavailable(message: impl Into<String>) -> Self {
        Self::LocationUnavailable(message.into())
    }

    /// Check if this error was raised before any I/O happened.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFields { .. } | Self::InvalidCoordinates { .. }
        )
    }

    /// Check if this error came from the remote store.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// The short alert shown to the user for this error.
    ///
    /// Remote failures all map to the same generic text; the detailed cause
    /// goes to the log.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingFields { .. } => "Please fill in all required fields.".to_string(),
            Self::InvalidCoordinates { .. } => {
                "The coordinates for this location are invalid or unavailable.".to_string()
            }
            Self::Store(_) => "Could not reach the location database. Please try again.".to_string(),
            Self::NotFound { .. } => "This location no longer exists.".to_string(),
            Self::LocationPermissionDenied => {
                "Location access is needed to fill in coordinates automatically.".to_string()
            }
            Self::LocationUnavailable(_) => {
                "Could not get the current location. Make sure GPS is on and try again."
                    .to_string()
            }
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } => self.to_string(),
        }
    }
}
