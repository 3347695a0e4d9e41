//! Status command for showing the current session.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use wd_core::{Clock, EngineSnapshot, SessionId, SessionState, TimerEngine};

use super::util::{format_clock, write_outbox};
use crate::Tracker;

/// Status shown to the user, as of a single instant.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub as_of: DateTime<Utc>,
    pub state: SessionState,
    pub label: &'static str,
    pub session_id: Option<SessionId>,
    pub remaining_work_seconds: i64,
    pub remaining_break_seconds: i64,
    pub elapsed_overtime_seconds: i64,
    pub work_done_seconds: i64,
    pub break_taken_seconds: i64,
    pub target_work_seconds: i64,
    pub target_break_seconds: i64,
    pub is_warning: bool,
}

impl StatusView {
    pub fn from_engine<C: Clock>(engine: &TimerEngine<C>) -> Self {
        let EngineSnapshot {
            at,
            state,
            remaining_work,
            remaining_break,
            elapsed_overtime,
            total_work_done,
            total_break_taken,
            is_warning,
            config,
        } = engine.snapshot();
        Self {
            as_of: at,
            state,
            label: state.label(),
            session_id: engine.session_id(),
            remaining_work_seconds: remaining_work.num_seconds(),
            remaining_break_seconds: remaining_break.num_seconds(),
            elapsed_overtime_seconds: elapsed_overtime.num_seconds(),
            work_done_seconds: total_work_done.num_seconds(),
            break_taken_seconds: total_break_taken.num_seconds(),
            target_work_seconds: config.target_work.num_seconds(),
            target_break_seconds: config.target_break.num_seconds(),
            is_warning,
        }
    }
}

fn clock(seconds: i64) -> String {
    format_clock(chrono::Duration::seconds(seconds))
}

/// Writes the human-readable status.
pub fn write_status<W: Write>(writer: &mut W, view: &StatusView) -> Result<()> {
    if view.state == SessionState::Idle {
        writeln!(writer, "No active session. Run `wd start` to begin.")?;
        return Ok(());
    }

    let warning = if view.is_warning { "  (almost done)" } else { "" };
    writeln!(writer, "State:        {}", view.label)?;
    match view.state {
        SessionState::Working => writeln!(
            writer,
            "Work left:    {}{warning}",
            clock(view.remaining_work_seconds)
        )?,
        SessionState::Break => writeln!(
            writer,
            "Break left:   {}{warning}",
            clock(view.remaining_break_seconds)
        )?,
        SessionState::Overtime => writeln!(
            writer,
            "Overtime:     {}",
            clock(view.elapsed_overtime_seconds)
        )?,
        SessionState::BreakEndedWaitingUser => {
            writeln!(writer, "Next:         `wd resume`")?;
        }
        SessionState::WorkCompleted => {
            writeln!(writer, "Next:         `wd overtime start` or `wd end-day`")?;
        }
        SessionState::Idle => {}
    }
    writeln!(
        writer,
        "Work done:    {} of {}",
        clock(view.work_done_seconds),
        clock(view.target_work_seconds)
    )?;
    writeln!(
        writer,
        "Break taken:  {} of {}",
        clock(view.break_taken_seconds),
        clock(view.target_break_seconds)
    )?;
    Ok(())
}

pub fn run<W: Write, C: Clock + Clone>(
    writer: &mut W,
    tracker: &mut Tracker<C>,
    json: bool,
) -> Result<()> {
    let outbox = tracker.tick()?;
    let view = StatusView::from_engine(tracker.engine());

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&view)?)?;
    } else {
        write_outbox(writer, &outbox)?;
        write_status(writer, &view)?;
    }
    Ok(())
}
