//! Command-line interface for tapak.
//!
//! This module provides the CLI structure for the `tapak` binary. Each
//! subcommand plays the part of one app screen.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AddCommand, ConfigCommand, DeleteCommand, EditCommand, ListCommand, MarkersCommand,
    NavigateCommand, PlatformArg, RecordArgs, WatchCommand,
};

/// tapak - Points of interest around the city
///
/// Browse, search, add, edit and delete locations in a shared real-time
/// directory, and get navigation links to them.
#[derive(Debug, Parser)]
#[command(name = "tapak")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List locations grouped by category
    List(ListCommand),

    /// Keep the list on screen and refresh it on every change
    Watch(WatchCommand),

    /// Show the map pins (locations with valid coordinates)
    Markers(MarkersCommand),

    /// Add a location
    Add(AddCommand),

    /// Edit a location
    Edit(EditCommand),

    /// Delete a location
    Delete(DeleteCommand),

    /// Get a navigation link to a location
    Navigate(NavigateCommand),

    /// List the categories and what to put in their details
    Categories,

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "tapak");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        use crate::logging::Verbosity;

        assert_eq!(parse(&["tapak", "-q", "categories"]).verbosity(), Verbosity::Quiet);
        assert_eq!(parse(&["tapak", "categories"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["tapak", "-v", "categories"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["tapak", "-vv", "categories"]).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_parse_list() {
        let cli = parse(&["tapak", "list", "--search", "kopi", "--json"]);
        match cli.command {
            Command::List(cmd) => {
                assert_eq!(cmd.search.as_deref(), Some("kopi"));
                assert!(cmd.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_add_with_negative_latitude() {
        let cli = parse(&[
            "tapak",
            "add",
            "--name",
            "Gedung Sate",
            "--description",
            "Landmark",
            "--category",
            "Jelajah Wisata",
            "--lat",
            "-6.9025",
            "--lon",
            "107.6188",
        ]);
        match cli.command {
            Command::Add(cmd) => {
                assert_eq!(cmd.fields.lat.as_deref(), Some("-6.9025"));
                assert!(!cmd.fields.here);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_here_conflicts_with_lat() {
        let result = Cli::try_parse_from(["tapak", "add", "--here", "--lat", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_edit() {
        let cli = parse(&["tapak", "edit", "-Nabc", "--name", "New"]);
        match cli.command {
            Command::Edit(cmd) => {
                assert_eq!(cmd.id, "-Nabc");
                assert_eq!(cmd.fields.name.as_deref(), Some("New"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_delete() {
        let cli = parse(&["tapak", "delete", "k1", "--yes"]);
        assert!(matches!(cli.command, Command::Delete(DeleteCommand { yes: true, .. })));
    }

    #[test]
    fn test_parse_navigate() {
        let cli = parse(&["tapak", "navigate", "--coords", "-6.9,107.6", "-p", "ios"]);
        match cli.command {
            Command::Navigate(cmd) => {
                assert!(cmd.id.is_none());
                assert_eq!(cmd.coords.as_deref(), Some("-6.9,107.6"));
                assert_eq!(cmd.platform, Some(PlatformArg::Ios));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_navigate_needs_a_target() {
        assert!(Cli::try_parse_from(["tapak", "navigate"]).is_err());
        assert!(Cli::try_parse_from(["tapak", "navigate", "k1", "--coords", "1,2"]).is_err());
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["tapak", "-c", "/custom/config.toml", "categories"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli = parse(&["tapak", "config", "validate", "--file", "x.toml"]);
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }
}
