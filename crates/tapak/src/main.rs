//! `tapak` - CLI for the tapak location directory
//!
//! Each subcommand stands in for one screen of the app: the categorized
//! list, the map, the add/edit form and the delete and navigate actions.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use tapak::cli::{
    AddCommand, Cli, Command, ConfigCommand, DeleteCommand, EditCommand, ListCommand,
    MarkersCommand, NavigateCommand, RecordArgs, WatchCommand,
};
use tapak::editor::{AssumeYes, Confirmer, DeletePrompt, DeleteOutcome, RecordDraft, RecordEditor};
use tapak::location::{fill_from_device, FixedLocation};
use tapak::navigation::{navigate, LinkOpener, NavigationOutcome, PrintOpener, SystemOpener};
use tapak::sections::{record_count, Section};
use tapak::store::RemoteStore;
use tapak::view::{MarkerView, SectionView};
use tapak::{init_logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // These must work even when the configuration is broken.
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", Config::default_config_path().display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            handle_config_validate(file.clone().or_else(|| cli.config.clone()));
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("could not load configuration")?;

    match cli.command {
        Command::Categories => {
            handle_categories(&config);
            return Ok(());
        }
        Command::Config(ConfigCommand::Show { json }) => return handle_config_show(&config, json),
        _ => {}
    }

    let store = config.open_store().context("could not open the location store")?;
    let store = store.as_ref();
    debug!(backend = store.name(), collection = %config.store.collection, "Store ready");

    match cli.command {
        Command::List(cmd) => handle_list(store, &config, &cmd).await,
        Command::Watch(cmd) => handle_watch(store, &config, &cmd).await,
        Command::Markers(cmd) => handle_markers(store, &config, &cmd).await,
        Command::Add(cmd) => handle_add(store, &config, &cmd).await,
        Command::Edit(cmd) => handle_edit(store, &config, &cmd).await,
        Command::Delete(cmd) => handle_delete(store, &config, &cmd).await,
        Command::Navigate(cmd) => handle_navigate(store, &config, &cmd).await,
        Command::Categories | Command::Config(_) => Ok(()),
    }
}

/// Turn a library error into the alert shown to the user; the details stay
/// in the error chain and the log.
fn alert(err: tapak::Error) -> anyhow::Error {
    if err.is_validation_error() {
        return err.into();
    }
    error!(error = %err, "Operation failed");
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}

async fn handle_list(store: &dyn RemoteStore, config: &Config, cmd: &ListCommand) -> Result<()> {
    let mut view = SectionView::sections(store, &config.store.collection)
        .await
        .map_err(alert)?;
    view.next_update().await;
    let query = cmd.search.as_deref().unwrap_or_default();
    let sections = view.filtered(query);
    view.close();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
    } else {
        print_sections(&sections, query);
    }
    Ok(())
}

async fn handle_watch(store: &dyn RemoteStore, config: &Config, cmd: &WatchCommand) -> Result<()> {
    let mut view = SectionView::sections(store, &config.store.collection)
        .await
        .map_err(alert)?;
    let query = cmd.search.as_deref().unwrap_or_default();
    info!(collection = %config.store.collection, "Watching for changes (Ctrl-C to stop)");

    loop {
        let updated = tokio::select! {
            _ = tokio::signal::ctrl_c() => false,
            updated = async { view.next_update().await.is_some() } => updated,
        };
        if !updated {
            break;
        }
        let sections = view.filtered(query);
        println!("---");
        print_sections(&sections, query);
    }

    view.close();
    debug!("Stopped watching");
    Ok(())
}

async fn handle_markers(
    store: &dyn RemoteStore,
    config: &Config,
    cmd: &MarkersCommand,
) -> Result<()> {
    let mut view = MarkerView::markers(store, &config.store.collection)
        .await
        .map_err(alert)?;
    let markers = view
        .next_update()
        .await
        .and_then(|state| state.data().cloned())
        .unwrap_or_default();
    view.close();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&markers)?);
    } else if markers.is_empty() {
        println!("No locations with valid coordinates.");
    } else {
        for marker in &markers {
            println!(
                "{:<22} {:>11.6} {:>11.6}  {}",
                marker.id, marker.latitude, marker.longitude, marker.name
            );
        }
    }
    Ok(())
}

async fn handle_add(store: &dyn RemoteStore, config: &Config, cmd: &AddCommand) -> Result<()> {
    let mut draft = RecordDraft::default();
    fill_draft(&mut draft, &cmd.fields, config).await?;

    let editor = RecordEditor::new(store, &config.store.collection).with_catalog(&config.catalog);
    let id = editor.create(&draft).await.map_err(alert)?;
    println!("Saved location {id}");
    Ok(())
}

async fn handle_edit(store: &dyn RemoteStore, config: &Config, cmd: &EditCommand) -> Result<()> {
    let editor = RecordEditor::new(store, &config.store.collection).with_catalog(&config.catalog);
    let record = editor.load(&cmd.id).await.map_err(alert)?;

    let mut draft = RecordDraft::from_record(&record);
    fill_draft(&mut draft, &cmd.fields, config).await?;

    editor.update(&cmd.id, &draft).await.map_err(alert)?;
    println!("Updated location {}", cmd.id);
    Ok(())
}

async fn fill_draft(draft: &mut RecordDraft, args: &RecordArgs, config: &Config) -> Result<()> {
    args.apply_to(draft);
    if args.here {
        let provider = config
            .location
            .home_position()
            .map_or_else(FixedLocation::unavailable, FixedLocation::new);
        fill_from_device(draft, &provider).await.map_err(alert)?;
    }
    if let Some(hint) = draft.details_hint(&config.catalog) {
        eprintln!("details: {hint} (set with --details)");
    }
    Ok(())
}

async fn handle_delete(store: &dyn RemoteStore, config: &Config, cmd: &DeleteCommand) -> Result<()> {
    let editor = RecordEditor::new(store, &config.store.collection);
    let record = editor.load(&cmd.id).await.map_err(alert)?;

    let confirmer: &dyn Confirmer = if cmd.yes { &AssumeYes } else { &StdinConfirmer };
    match editor
        .delete(&cmd.id, Some(record.name()), confirmer)
        .await
        .map_err(alert)?
    {
        DeleteOutcome::Deleted => println!("Deleted location {}", cmd.id),
        DeleteOutcome::Cancelled => println!("Cancelled."),
    }
    Ok(())
}

async fn handle_navigate(
    store: &dyn RemoteStore,
    config: &Config,
    cmd: &NavigateCommand,
) -> Result<()> {
    let coordinates = match (&cmd.coords, &cmd.id) {
        (Some(coords), _) => coords.clone(),
        (None, Some(id)) => {
            let editor = RecordEditor::new(store, &config.store.collection);
            let record = editor.load(id).await.map_err(alert)?;
            record.coordinates_text().to_string()
        }
        (None, None) => anyhow::bail!("give a location id or --coords"),
    };

    let platform = cmd.platform.map_or(config.navigation.platform, Into::into);
    let opener: &dyn LinkOpener = if cmd.open { &SystemOpener } else { &PrintOpener };

    match navigate(&coordinates, platform, opener).await {
        Ok(NavigationOutcome::Unavailable(url)) => {
            warn!(url = %url, "No application could open the navigation link");
        }
        Ok(outcome) => {
            if cmd.open {
                println!("Opened {}", outcome.url());
            }
        }
        Err(e) => return Err(alert(e)),
    }
    Ok(())
}

fn handle_categories(config: &Config) {
    for category in &config.catalog.categories {
        println!("{}", category.label);
        if !category.details_hint.is_empty() {
            println!("    details: {}", category.details_hint);
        }
    }
}

fn handle_config_show(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Store]");
    println!("  Backend:            {:?}", config.store.backend);
    println!("  Database path:      {}", config.database_path().display());
    println!(
        "  Firebase URL:       {}",
        config.store.firebase_url.as_deref().unwrap_or("(not set)")
    );
    println!("  Collection:         {}", config.store.collection);
    println!("  Request timeout:    {}s", config.store.request_timeout_secs);
    println!();
    println!("[Navigation]");
    println!("  Platform:           {}", config.navigation.platform);
    println!();
    println!("[Catalog]");
    println!("  Categories:         {}", config.catalog.len());
    println!();
    println!("[Location]");
    match config.location.home_position() {
        Some(home) => println!("  Home:               {},{}", home.latitude, home.longitude),
        None => println!("  Home:               (not set)"),
    }
    Ok(())
}

fn handle_config_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

fn print_sections(sections: &[Section], query: &str) {
    if sections.is_empty() {
        if query.is_empty() {
            println!("No locations yet. Add one with `tapak add`.");
        } else {
            println!("No locations match \"{query}\".");
        }
        return;
    }

    for section in sections {
        println!("{} ({})", section.title, section.data.len());
        for record in &section.data {
            let fields = &record.fields;
            println!("  {}  [{}]", fields.name, record.id);
            if !fields.description.is_empty() {
                println!("      {}", fields.description);
            }
            if let Some(coordinates) = &fields.coordinates {
                println!("      coordinates: {coordinates}");
            }
            if let Some(accuracy) = &fields.accuracy {
                println!("      accuracy: {accuracy} m");
            }
            if let Some(details) = &fields.details {
                println!("      details: {details}");
            }
        }
    }
    debug!(records = record_count(sections), "Rendered list");
}

/// Asks on the terminal; anything but "y"/"yes" declines.
#[derive(Debug)]
struct StdinConfirmer;

impl Confirmer for StdinConfirmer {
    fn confirm(&self, prompt: &DeletePrompt) -> bool {
        let mut stderr = io::stderr();
        if write!(stderr, "{}\n{} [y/N] ", prompt.title, prompt.message)
            .and_then(|()| stderr.flush())
            .is_err()
        {
            return false;
        }

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
