//! Command definitions for the CLI.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::editor::RecordDraft;
use crate::navigation::Platform;

/// Arguments for the list command.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Only show locations whose name, description or category contains this
    #[arg(short, long)]
    pub search: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for the watch command.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Only show locations whose name, description or category contains this
    #[arg(short, long)]
    pub search: Option<String>,
}

/// Arguments for the markers command.
#[derive(Debug, Args)]
pub struct MarkersCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Record fields that can be given on the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct RecordArgs {
    /// Location name
    #[arg(long)]
    pub name: Option<String>,

    /// Description
    #[arg(long)]
    pub description: Option<String>,

    /// Category label (see `tapak categories`)
    #[arg(long)]
    pub category: Option<String>,

    /// Latitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, conflicts_with = "here")]
    pub lat: Option<String>,

    /// Longitude in decimal degrees
    #[arg(long, allow_hyphen_values = true, conflicts_with = "here")]
    pub lon: Option<String>,

    /// GPS accuracy in meters
    #[arg(long)]
    pub accuracy: Option<String>,

    /// Category-specific details
    #[arg(long)]
    pub details: Option<String>,

    /// Use the current (configured home) location for the coordinates
    #[arg(long)]
    pub here: bool,
}

impl RecordArgs {
    /// Overwrite the draft fields that were given.
    pub fn apply_to(&self, draft: &mut RecordDraft) {
        fn set(target: &mut String, value: Option<&String>) {
            if let Some(value) = value {
                target.clone_from(value);
            }
        }

        set(&mut draft.name, self.name.as_ref());
        set(&mut draft.description, self.description.as_ref());
        set(&mut draft.latitude, self.lat.as_ref());
        set(&mut draft.longitude, self.lon.as_ref());
        set(&mut draft.accuracy, self.accuracy.as_ref());
        set(&mut draft.details, self.details.as_ref());
        if let Some(category) = &self.category {
            draft.category = Some(category.clone());
        }
    }
}

/// Arguments for the add command.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Record fields
    #[command(flatten)]
    pub fields: RecordArgs,
}

/// Arguments for the edit command.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Id of the location to edit
    #[arg(allow_hyphen_values = true)]
    pub id: String,

    /// Fields to change; everything else keeps its current value
    #[command(flatten)]
    pub fields: RecordArgs,
}

/// Arguments for the delete command.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Id of the location to delete
    #[arg(allow_hyphen_values = true)]
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the navigate command.
#[derive(Debug, Args)]
pub struct NavigateCommand {
    /// Id of the location to navigate to
    #[arg(
        allow_hyphen_values = true,
        required_unless_present = "coords",
        conflicts_with = "coords"
    )]
    pub id: Option<String>,

    /// Navigate to raw "lat,lon" coordinates instead of a stored location
    #[arg(long, allow_hyphen_values = true)]
    pub coords: Option<String>,

    /// Which deep link to try first (defaults to the configured platform)
    #[arg(short, long, value_enum)]
    pub platform: Option<PlatformArg>,

    /// Hand the link to the system URL handler instead of printing it
    #[arg(long)]
    pub open: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Platform argument for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    /// Android navigation intent
    Android,
    /// iOS Google Maps scheme
    Ios,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Android => Self::Android,
            PlatformArg::Ios => Self::Ios,
        }
    }
}
