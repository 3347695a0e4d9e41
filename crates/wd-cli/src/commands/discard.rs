//! Discard command: abandons the active session without recovering it.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use wd_db::Database;

/// Ends the active session at `now`.
///
/// Works even when the stored session cannot be reconstructed. The open
/// segment is left open, so time since the interruption is not counted.
pub fn run<W: Write>(writer: &mut W, db: &Database, now: DateTime<Utc>) -> Result<()> {
    let Some(session) = db
        .active_session()
        .context("failed to load active session")?
    else {
        writeln!(writer, "No active session.")?;
        return Ok(());
    };

    db.discard_session(session.id, now)
        .with_context(|| format!("failed to end session {}", session.id))?;
    tracing::info!(session_id = %session.id, "discarded session");
    writeln!(
        writer,
        "Discarded session {} from {}.",
        session.id, session.date_local
    )?;
    Ok(())
}
