//! Location record model.
//!
//! Records arrive from the store as loosely typed JSON documents. Reading is
//! lenient: missing keys, `null`, and blank strings in optional fields all
//! become "absent", and numbers are accepted where text is expected. Required
//! text is kept as stored. Writing omits absent fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Section title used for records without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The stored fields of a record, without its id.
///
/// This is also the shape written by create and update: the store assigns
/// or addresses the id separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    /// Display name.
    #[serde(default, deserialize_with = "text")]
    pub name: String,

    /// Free-text description.
    #[serde(default, deserialize_with = "text")]
    pub description: String,

    /// Category label, the grouping key of the list view.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub category: Option<String>,

    /// Raw `"lat,lon"` text.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinates: Option<String>,

    /// GPS accuracy in meters, as text.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub accuracy: Option<String>,

    /// Category-specific extra information.
    #[serde(
        default,
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub details: Option<String>,
}

impl RecordFields {
    /// Read fields from a raw store document.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn from_value(value: &Value) -> std::result::Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// The category used for grouping and searching.
    #[must_use]
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNCATEGORIZED)
    }
}

/// A record together with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationRecord {
    /// Opaque id assigned by the store.
    pub id: String,

    /// Stored fields.
    #[serde(flatten)]
    pub fields: RecordFields,
}

impl LocationRecord {
    /// Build a record from a snapshot entry, injecting the key as id.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object.
    pub fn from_entry(
        id: impl Into<String>,
        value: &Value,
    ) -> std::result::Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.into(),
            fields: RecordFields::from_value(value)?,
        })
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.fields.name
    }

    /// The category used for grouping and searching.
    #[must_use]
    pub fn category_label(&self) -> &str {
        self.fields.category_label()
    }

    /// Raw coordinate text, empty when absent.
    #[must_use]
    pub fn coordinates_text(&self) -> &str {
        self.fields.coordinates.as_deref().unwrap_or_default()
    }

    /// Whether the query occurs in the name, description or category label,
    /// ignoring case. `query` must already be lowercase.
    #[must_use]
    pub fn matches_lowercase(&self, query: &str) -> bool {
        self.fields.name.to_lowercase().contains(query)
            || self.fields.description.to_lowercase().contains(query)
            || self.category_label().to_lowercase().contains(query)
    }
}

/// A numeric coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

impl Coordinates {
    /// Parse `"<lat>,<lon>"`.
    ///
    /// Exactly two comma-separated tokens are required; each is trimmed and
    /// must parse to a finite number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCoordinates`] for anything else.
    pub fn parse(text: &str) -> Result<Self> {
        let mut tokens = text.split(',');
        let (Some(lat), Some(lon), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(Error::invalid_coordinates(text));
        };

        let latitude = parse_degrees(lat).ok_or_else(|| Error::invalid_coordinates(text))?;
        let longitude = parse_degrees(lon).ok_or_else(|| Error::invalid_coordinates(text))?;

        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl FromStr for Coordinates {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

fn parse_degrees(token: &str) -> Option<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(scalar_text(value).filter(|s| !s.trim().is_empty()))
}

fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(scalar_text(value).unwrap_or_default())
}
