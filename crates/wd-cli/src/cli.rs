//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Workday timer.
///
/// Tracks a daily work target, breaks, and overtime against the wall clock.
/// Sessions survive restarts, sleep, and crashes.
#[derive(Debug, Parser)]
#[command(name = "wd", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start a new workday session.
    Start(Durations),

    /// Pause work and start a break.
    Break,

    /// End the current break before its timer runs out.
    EndBreak,

    /// Resume work after the break timer ran out.
    Resume,

    /// Start or stop overtime after the work target was reached.
    Overtime {
        #[command(subcommand)]
        action: OvertimeAction,
    },

    /// End the day (early if the work target has not been reached).
    EndDay,

    /// Show the current session.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Keep the timer running and print notifications until the session ends.
    Watch,

    /// Abandon the active session without recovering it.
    Discard,

    /// Show or update default session durations.
    Settings(Durations),

    /// Show totals for past days.
    History {
        /// Show a calendar month instead of a week.
        #[arg(long, conflicts_with = "year")]
        month: bool,

        /// Show a calendar year, grouped by month.
        #[arg(long)]
        year: bool,

        /// Periods relative to the current one (-1 is the previous period).
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i32,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Duration overrides in minutes.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct Durations {
    /// Work target in minutes.
    #[arg(long = "work", value_name = "MINUTES")]
    pub work_minutes: Option<u32>,

    /// Break allowance in minutes.
    #[arg(long = "break", value_name = "MINUTES")]
    pub break_minutes: Option<u32>,

    /// Minutes between overtime reminders (0 disables them).
    #[arg(long = "notify", value_name = "MINUTES")]
    pub notify_minutes: Option<u32>,
}

impl Durations {
    pub const fn is_empty(&self) -> bool {
        self.work_minutes.is_none() && self.break_minutes.is_none() && self.notify_minutes.is_none()
    }

    /// Applies the given overrides on top of `settings`.
    pub fn apply(&self, mut settings: wd_core::Settings) -> wd_core::Settings {
        if let Some(work) = self.work_minutes {
            settings.work_duration_minutes = work;
        }
        if let Some(brk) = self.break_minutes {
            settings.break_duration_minutes = brk;
        }
        if let Some(notify) = self.notify_minutes {
            settings.overtime_notify_interval_minutes = notify;
        }
        settings
    }
}

/// Overtime actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum OvertimeAction {
    /// Start counting overtime.
    Start,
    /// Stop overtime and end the day.
    Stop,
}
