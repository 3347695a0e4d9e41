//! Watch command: keeps ticking the engine until the session ends.

use std::io::Write;

use anyhow::Result;
use wd_core::{Clock, SessionState};

use super::status::{StatusView, write_status};
use super::util::write_outbox;
use crate::Tracker;

/// Ticks until the session returns to idle, calling `wait` between ticks.
///
/// Changes made by other `wd` invocations are picked up before each tick, or
/// when one of them wins a race to record a transition.
pub fn run<W, C, F>(writer: &mut W, tracker: &mut Tracker<C>, mut wait: F) -> Result<()>
where
    W: Write,
    C: Clock + Clone,
    F: FnMut(),
{
    if tracker.engine().state() == SessionState::Idle {
        writeln!(writer, "No active session. Run `wd start` to begin.")?;
        return Ok(());
    }
    write_status(writer, &StatusView::from_engine(tracker.engine()))?;
    writer.flush()?;

    loop {
        if tracker.refresh()? {
            writeln!(writer, "Session changed: now {}.", tracker.engine().state().label())?;
        }
        if tracker.engine().state() == SessionState::Idle {
            writeln!(writer, "Session ended.")?;
            return Ok(());
        }

        let Some(outbox) = tracker.tick_shared()? else {
            writeln!(writer, "Session changed: now {}.", tracker.engine().state().label())?;
            continue;
        };
        if !outbox.is_empty() {
            write_outbox(writer, &outbox)?;
            writer.flush()?;
        }
        wait();
    }
}
