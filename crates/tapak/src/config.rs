//! Configuration management for tapak.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::location::Position;
use crate::navigation::Platform;
use crate::store::{normalize_path, FirebaseStore, RemoteStore, SqliteStore};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "tapak";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "points.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "TAPAK_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TAPAK_`, sections separated by
///    `__`, e.g. `TAPAK_STORE__BACKEND=firebase`)
/// 2. TOML config file at `~/.config/tapak/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Store configuration.
    pub store: StoreConfig,
    /// Navigation configuration.
    pub navigation: NavigationConfig,
    /// Category catalog.
    pub catalog: Catalog,
    /// Fixed device position.
    pub location: LocationConfig,
}

/// Which store backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Local `SQLite` document store.
    #[default]
    Sqlite,
    /// Hosted Firebase Realtime Database.
    Firebase,
}

/// Store-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to use.
    pub backend: Backend,
    /// Path to the local database file.
    /// Defaults to `~/.local/share/tapak/points.db`
    pub database_path: Option<PathBuf>,
    /// Firebase database URL (required for the firebase backend).
    pub firebase_url: Option<String>,
    /// Collection holding the location records.
    pub collection: String,
    /// Timeout for single HTTP writes, in seconds.
    pub request_timeout_secs: u64,
}

/// Navigation-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Which deep link to try first.
    pub platform: Platform,
}

/// The position reported for "current location" on machines without GPS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Latitude in decimal degrees.
    pub home_latitude: Option<f64>,
    /// Longitude in decimal degrees.
    pub home_longitude: Option<f64>,
    /// Accuracy in meters.
    pub home_accuracy: Option<f64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            database_path: None, // Resolved to the data dir at runtime
            firebase_url: None,
            collection: "points".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl LocationConfig {
    /// The configured position, if both coordinates are set.
    #[must_use]
    pub fn home_position(&self) -> Option<Position> {
        Some(Position {
            latitude: self.home_latitude?,
            longitude: self.home_longitude?,
            accuracy: self.home_accuracy,
        })
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config: Config = Self::figment(config_path).extract()?;
        config.validate()?;
        Ok(config)
    }

    fn figment(config_path: Option<PathBuf>) -> Figment {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        debug!(path = %config_file.display(), "Loading configuration");

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let collection = &self.store.collection;
        if collection.starts_with('/')
            || collection.ends_with('/')
            || normalize_path(collection).is_err()
        {
            return Err(Error::ConfigValidation {
                message: format!("invalid collection name: {collection:?}"),
            });
        }

        if self.store.backend == Backend::Firebase {
            match self.store.firebase_url.as_deref() {
                Some(url) if url.starts_with("https://") => {}
                Some(url) => {
                    return Err(Error::ConfigValidation {
                        message: format!("firebase_url must start with https:// (got {url})"),
                    });
                }
                None => {
                    return Err(Error::ConfigValidation {
                        message: "firebase_url is required for the firebase backend".to_string(),
                    });
                }
            }
        }

        if self.store.request_timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "request_timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.catalog.is_empty() {
            return Err(Error::ConfigValidation {
                message: "catalog must contain at least one category".to_string(),
            });
        }
        if self.catalog.labels().any(|label| label.trim().is_empty()) {
            return Err(Error::ConfigValidation {
                message: "category labels must not be empty".to_string(),
            });
        }

        if self.location.home_latitude.is_some() != self.location.home_longitude.is_some() {
            return Err(Error::ConfigValidation {
                message: "home_latitude and home_longitude must be set together".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the HTTP request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.store.request_timeout_secs)
    }

    /// Open the configured store backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the local database cannot be opened or the HTTP
    /// client cannot be built.
    pub fn open_store(&self) -> Result<Box<dyn RemoteStore>> {
        match self.store.backend {
            Backend::Sqlite => Ok(Box::new(SqliteStore::open(self.database_path())?)),
            Backend::Firebase => {
                let url = self.store.firebase_url.as_deref().ok_or_else(|| {
                    Error::ConfigValidation {
                        message: "firebase_url is required for the firebase backend".to_string(),
                    }
                })?;
                Ok(Box::new(FirebaseStore::new(url, self.request_timeout())?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firebase_config(url: Option<&str>) -> Config {
        let mut config = Config::default();
        config.store.backend = Backend::Firebase;
        config.store.firebase_url = url.map(str::to_string);
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.store.backend, Backend::Sqlite);
        assert_eq!(config.store.collection, "points");
        assert_eq!(config.store.request_timeout_secs, 30);
        assert_eq!(config.navigation.platform, Platform::Android);
        assert_eq!(config.catalog.len(), 3);
        assert!(config.location.home_position().is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
        assert!(firebase_config(Some("https://demo.firebaseio.com"))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_validate_collection() {
        for bad in ["", "/points", "points/", "po.ints"] {
            let mut config = Config::default();
            config.store.collection = bad.to_string();
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains("collection"), "accepted {bad:?}");
        }

        let mut config = Config::default();
        config.store.collection = "bandung/points".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_firebase_url() {
        let err = firebase_config(None).validate().unwrap_err().to_string();
        assert!(err.contains("firebase_url is required"));

        let err = firebase_config(Some("http://demo.firebaseio.com"))
            .validate()
            .unwrap_err()
            .to_string();
        assert!(err.contains("https://"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.store.request_timeout_secs = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("request_timeout_secs"));
    }

    #[test]
    fn test_validate_empty_catalog() {
        let mut config = Config::default();
        config.catalog.categories.clear();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("at least one category"));
    }

    #[test]
    fn test_validate_half_set_home() {
        let mut config = Config::default();
        config.location.home_latitude = Some(-6.9);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("home_latitude"));

        config.location.home_longitude = Some(107.6);
        assert!(config.validate().is_ok());
        let home = config.location.home_position().unwrap();
        assert!((home.longitude - 107.6).abs() < f64::EPSILON);
        assert!(home.accuracy.is_none());
    }

    #[test]
    fn test_database_path_default() {
        let config = Config::default();
        let path = config.database_path();
        assert!(path.to_string_lossy().contains("tapak"));
        assert!(path.to_string_lossy().ends_with("points.db"));
    }

    #[test]
    fn test_database_path_custom() {
        let mut config = Config::default();
        config.store.database_path = Some(PathBuf::from("/custom/path/db.sqlite"));

        assert_eq!(
            config.database_path(),
            PathBuf::from("/custom/path/db.sqlite")
        );
    }

    #[test]
    fn test_request_timeout() {
        assert_eq!(
            Config::default().request_timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("tapak"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // A missing file means defaults.
        let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_toml_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tapak.toml",
                r#"
                [store]
                collection = "bandung"

                [navigation]
                platform = "ios"

                [[catalog.categories]]
                label = "Museum"
                details_hint = "Contoh: Jam buka"
                "#,
            )?;
            jail.set_env("TAPAK_STORE__REQUEST_TIMEOUT_SECS", "5");

            let config = Config::load_from(Some(PathBuf::from("tapak.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.store.collection, "bandung");
            assert_eq!(config.store.request_timeout_secs, 5);
            assert_eq!(config.navigation.platform, Platform::Ios);
            assert_eq!(config.catalog.len(), 1);
            assert!(config.catalog.contains("Museum"));
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tapak.toml", "[store]\nrequest_timeout_secs = 0\n")?;
            let result = Config::load_from(Some(PathBuf::from("tapak.toml")));
            assert!(matches!(result, Err(Error::ConfigValidation { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_load_backend_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tapak.toml",
                r#"
                [store]
                backend = "firebase"
                firebase_url = "https://demo-rtdb.firebaseio.com"

                [location]
                home_latitude = -6.9175
                home_longitude = 107.6191
                "#,
            )?;

            let config = Config::load_from(Some(PathBuf::from("tapak.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.store.backend, Backend::Firebase);
            assert_eq!(
                config.store.firebase_url.as_deref(),
                Some("https://demo-rtdb.firebaseio.com")
            );
            assert!(config.location.home_position().is_some());
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_firebase_file_without_url() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tapak.toml", "[store]\nbackend = \"firebase\"\n")?;
            let result = Config::load_from(Some(PathBuf::from("tapak.toml")));
            assert!(matches!(result, Err(Error::ConfigValidation { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_open_store_firebase_is_offline() {
        let store = firebase_config(Some("https://demo.firebaseio.com"))
            .open_store()
            .unwrap();
        assert_eq!(store.name(), "firebase");
    }

    #[test]
    fn test_open_store_sqlite() {
        let dir = std::env::temp_dir().join(format!("tapak-config-test-{}", std::process::id()));
        let mut config = Config::default();
        config.store.database_path = Some(dir.join("points.db"));

        let store = config.open_store().unwrap();
        assert_eq!(store.name(), "sqlite");
        drop(store);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_serialize() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains("\"backend\":\"sqlite\""));
        assert!(json.contains("\"platform\":\"android\""));
    }
}
