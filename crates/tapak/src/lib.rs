//! `tapak` - A live, categorized directory of points of interest
//!
//! This library is the view/controller layer over a real-time document
//! store: it keeps a grouped, searchable list and a set of map markers in
//! sync with the store, validates and writes records, and builds navigation
//! links to an external maps application.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod editor;
pub mod error;
pub mod location;
pub mod logging;
pub mod markers;
pub mod navigation;
pub mod record;
pub mod sections;
pub mod store;
pub mod view;

pub use catalog::{Catalog, Category};
pub use config::Config;
pub use editor::{RecordDraft, RecordEditor};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use markers::Marker;
pub use record::{Coordinates, LocationRecord, RecordFields};
pub use sections::Section;
pub use store::{FirebaseStore, RemoteStore, Snapshot, SqliteStore, Subscription};
pub use view::{LiveView, MarkerView, SectionView, ViewState};
