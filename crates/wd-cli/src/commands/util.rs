//! Shared formatting for CLI commands.

use std::io::Write;

use anyhow::Result;
use chrono::Duration;
use wd_core::{Notification, Outbox};

/// Formats a countdown or count-up as `HH:MM:SS`.
///
/// Negative values are shown as zero. Hours are not wrapped at 24.
pub fn format_clock(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Formats a total as `H:MM`, or `—` when there is nothing to show.
pub fn format_hours(seconds: i64) -> String {
    if seconds <= 0 {
        return "—".to_string();
    }
    let total_minutes = seconds / 60;
    format!("{}:{:02}", total_minutes / 60, total_minutes % 60)
}

/// One line of text for a notification.
pub fn describe(notification: &Notification) -> String {
    match notification {
        Notification::BreakEnded => "Break is over. Run `wd resume` to get back to work.".into(),
        Notification::WorkCompleted => {
            "Work target reached. Run `wd overtime start` or `wd end-day`.".into()
        }
        Notification::OvertimeNotification { elapsed } => {
            format!("Overtime running for {}.", format_clock(*elapsed))
        }
        Notification::StateChanged { from, to } => format!("{} -> {}", from.label(), to.label()),
    }
}

/// Writes every notification in the outbox, one per line.
pub fn write_outbox<W: Write>(writer: &mut W, outbox: &Outbox) -> Result<()> {
    for notification in outbox {
        writeln!(writer, "{}", describe(notification))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wd_core::SessionState;

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::zero()), "00:00:00");
        assert_eq!(format_clock(Duration::seconds(59)), "00:00:59");
        assert_eq!(format_clock(Duration::seconds(3661)), "01:01:01");
        assert_eq!(format_clock(Duration::hours(30)), "30:00:00");
    }

    #[test]
    fn test_format_clock_clamps_negative() {
        assert_eq!(format_clock(Duration::seconds(-90)), "00:00:00");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(0), "—");
        assert_eq!(format_hours(59), "0:00");
        assert_eq!(format_hours(2700), "0:45");
        assert_eq!(format_hours(8 * 3600 + 5 * 60), "8:05");
        assert_eq!(format_hours(100 * 3600), "100:00");
    }

    #[test]
    fn test_describe_state_change() {
        let text = describe(&Notification::StateChanged {
            from: SessionState::Working,
            to: SessionState::Break,
        });
        assert_eq!(text, "working -> on break");
    }

    #[test]
    fn test_describe_overtime() {
        let text = describe(&Notification::OvertimeNotification {
            elapsed: Duration::minutes(90),
        });
        assert_eq!(text, "Overtime running for 01:30:00.");
    }
}
