//! Settings command for default session durations.

use std::io::Write;

use anyhow::{Context, Result};
use wd_db::Database;

use crate::Durations;

/// Shows the stored settings, first applying any overrides.
///
/// Changes take effect from the next `wd start`; a running session keeps its
/// targets.
pub fn run<W: Write>(writer: &mut W, db: &mut Database, overrides: Durations) -> Result<()> {
    let mut settings = db.load_settings().context("failed to load settings")?;
    if !overrides.is_empty() {
        settings = overrides.apply(settings);
        db.save_settings(&settings)
            .context("failed to save settings")?;
        writeln!(writer, "Settings saved.")?;
    }

    writeln!(writer, "Work target:        {} min", settings.work_duration_minutes)?;
    writeln!(writer, "Break allowance:    {} min", settings.break_duration_minutes)?;
    match settings.overtime_notify_interval_minutes {
        0 => writeln!(writer, "Overtime reminders: off")?,
        minutes => writeln!(writer, "Overtime reminders: every {minutes} min")?,
    }
    Ok(())
}
