use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wd_cli::commands::{control, discard, history, settings, status, watch};
use wd_cli::{Cli, Commands, Config, OvertimeAction, Tracker};
use wd_core::{Clock, Command, SystemClock};
use wd_db::Database;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// Opens the database and restores the active session, if any.
fn open_tracker(config_path: Option<&Path>) -> Result<(Tracker<SystemClock>, Config)> {
    let (db, config) = open_database(config_path)?;
    let tracker = Tracker::load(db, SystemClock)?;
    Ok((tracker, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config_path = cli.config.as_deref();
    let mut out = std::io::stdout().lock();

    match cli.command {
        Some(Commands::Start(overrides)) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            control::start(&mut out, &mut tracker, overrides)?;
        }
        Some(Commands::Break) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            control::run(&mut out, &mut tracker, Command::StartBreak)?;
        }
        Some(Commands::EndBreak) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            control::run(&mut out, &mut tracker, Command::EndBreakEarly)?;
        }
        Some(Commands::Resume) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            control::run(&mut out, &mut tracker, Command::ResumeWork)?;
        }
        Some(Commands::Overtime { action }) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            let command = match action {
                OvertimeAction::Start => Command::StartOvertime,
                OvertimeAction::Stop => Command::StopOvertime,
            };
            control::run(&mut out, &mut tracker, command)?;
        }
        Some(Commands::EndDay) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            control::end_day(&mut out, &mut tracker)?;
        }
        Some(Commands::Status { json }) => {
            let (mut tracker, _config) = open_tracker(config_path)?;
            status::run(&mut out, &mut tracker, json)?;
        }
        Some(Commands::Watch) => {
            let (mut tracker, config) = open_tracker(config_path)?;
            let interval = config.tick_interval();
            watch::run(&mut out, &mut tracker, || std::thread::sleep(interval))?;
        }
        Some(Commands::Discard) => {
            // Skips recovery so that sessions which cannot be restored can still be ended.
            let (db, _config) = open_database(config_path)?;
            discard::run(&mut out, &db, SystemClock.now())?;
        }
        Some(Commands::Settings(overrides)) => {
            let (mut db, _config) = open_database(config_path)?;
            settings::run(&mut out, &mut db, overrides)?;
        }
        Some(Commands::History {
            month,
            year,
            offset,
            json,
        }) => {
            let (db, _config) = open_database(config_path)?;
            let period = if year {
                history::Period::Year
            } else if month {
                history::Period::Month
            } else {
                history::Period::Week
            };
            history::run(&mut out, &db, period, offset, json)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
