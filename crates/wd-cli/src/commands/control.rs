//! Commands that drive the session: start, break, resume, overtime, end-day.

use std::io::Write;

use anyhow::{Context, Result};
use wd_core::{Clock, Command, SessionState};

use super::util::{format_clock, write_outbox};
use crate::Durations;
use crate::Tracker;

/// Starts a session using stored settings plus any overrides.
///
/// Explicit overrides are saved as the new defaults.
pub fn start<W: Write, C: Clock + Clone>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    overrides: Durations,
) -> Result<()> {
    let stored = tracker
        .database()
        .load_settings()
        .context("failed to load settings")?;
    let settings = overrides.apply(stored);

    tracker.start(&settings)?;
    if !overrides.is_empty() {
        tracker
            .database_mut()
            .save_settings(&settings)
            .context("failed to save settings")?;
    }

    let engine = tracker.engine();
    writeln!(
        writer,
        "Started working. Target {}, break allowance {}.",
        format_clock(engine.config().target_work),
        format_clock(engine.config().target_break),
    )?;
    Ok(())
}

/// Runs one engine command, reporting anything that happened since the last run.
pub fn run<W: Write, C: Clock + Clone>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    command: Command,
) -> Result<()> {
    let pending = tracker.tick()?;
    write_outbox(writer, &pending)?;

    let outbox = tracker.execute(command)?;
    write_outbox(writer, &outbox)?;
    write_totals(writer, tracker)?;
    Ok(())
}

/// Ends the day, early if the work target has not been reached yet.
pub fn end_day<W: Write, C: Clock + Clone>(writer: &mut W, tracker: &mut Tracker<C>) -> Result<()> {
    let pending = tracker.tick()?;
    write_outbox(writer, &pending)?;

    let command = match tracker.engine().state() {
        SessionState::Working => Command::EndDayEarly,
        _ => Command::EndDay,
    };
    let outbox = tracker.execute(command)?;
    write_outbox(writer, &outbox)?;
    write_totals(writer, tracker)?;
    Ok(())
}

fn write_totals<W: Write, C: Clock + Clone>(writer: &mut W, tracker: &Tracker<C>) -> Result<()> {
    let engine = tracker.engine();
    if let Some(totals) = engine.final_totals() {
        writeln!(
            writer,
            "Day ended. Worked {}, break {}.",
            format_clock(totals.work),
            format_clock(totals.break_time)
        )?;
    }
    Ok(())
}
