//! Timer engine implementation.
//!
//! The engine is a wall-clock-based state machine. It does not use internal
//! threads: the caller is responsible for calling [`TimerEngine::tick`]
//! periodically. Durations are never counted per tick; every derived quantity
//! is recomputed from absolute instants on read, so they stay correct across
//! sleep, suspension, or a late tick.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Working <-> Break -> BreakEndedWaitingUser -> Working
//!         Working -> WorkCompleted -> Overtime -> Idle
//!         Working -> Idle, WorkCompleted -> Idle
//! ```
//!
//! ## Usage
//!
//! ```
//! use wd_core::{SessionState, SystemClock, TimerEngine};
//!
//! let mut engine = TimerEngine::new(SystemClock);
//! engine.configure(480, 60, 30).unwrap();
//! engine.start_work().unwrap();
//! assert_eq!(engine.state(), SessionState::Working);
//! // In a loop:
//! let outbox = engine.tick();
//! # assert!(outbox.is_empty());
//! ```

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::clock::Clock;
use crate::notification::{Notification, Outbox};
use crate::state::SessionState;
use crate::types::SessionId;

/// Remaining work at or below this raises the warning flag.
pub const WORK_WARNING_THRESHOLD: Duration = Duration::minutes(10);

/// Remaining break at or below this raises the warning flag.
pub const BREAK_WARNING_THRESHOLD: Duration = Duration::minutes(2);

/// A state-changing command from the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    StartWork,
    StartBreak,
    EndBreakEarly,
    ResumeWork,
    StartOvertime,
    StopOvertime,
    EndDay,
    EndDayEarly,
}

impl Command {
    /// The only state this command is accepted from.
    pub const fn required_state(self) -> SessionState {
        match self {
            Self::StartWork => SessionState::Idle,
            Self::StartBreak | Self::EndDayEarly => SessionState::Working,
            Self::EndBreakEarly => SessionState::Break,
            Self::ResumeWork => SessionState::BreakEndedWaitingUser,
            Self::StartOvertime | Self::EndDay => SessionState::WorkCompleted,
            Self::StopOvertime => SessionState::Overtime,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StartWork => "start work",
            Self::StartBreak => "start a break",
            Self::EndBreakEarly => "end the break early",
            Self::ResumeWork => "resume work",
            Self::StartOvertime => "start overtime",
            Self::StopOvertime => "stop overtime",
            Self::EndDay => "end the day",
            Self::EndDayEarly => "end the day early",
        };
        f.write_str(s)
    }
}

/// Errors returned by engine commands. None of them mutate the engine.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    /// The command is not allowed from the current state.
    #[error("cannot {command} while {}", state.label())]
    InvalidTransition {
        command: Command,
        state: SessionState,
    },

    /// Targets can only change between sessions.
    #[error("cannot configure the timer while {}", state.label())]
    ConfigureWhileActive { state: SessionState },
}

/// Targets for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub target_work: Duration,
    pub target_break: Duration,
    /// Minutes between overtime reminders; 0 disables them.
    pub overtime_notify_interval_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_work: Duration::zero(),
            target_break: Duration::zero(),
            overtime_notify_interval_minutes: 0,
        }
    }
}

impl EngineConfig {
    fn overtime_notify_interval(&self) -> Option<Duration> {
        (self.overtime_notify_interval_minutes > 0)
            .then(|| Duration::minutes(i64::from(self.overtime_notify_interval_minutes)))
    }
}

/// Work and break totals captured when a session is reset to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTotals {
    pub work: Duration,
    pub break_time: Duration,
}

/// Engine fields to install directly, bypassing the transition table.
///
/// Built by [`crate::reconstruct`] from persisted segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestorePoint {
    pub state: SessionState,
    pub accumulated_work: Duration,
    pub accumulated_break: Duration,
    pub current_segment_start: Option<DateTime<Utc>>,
    pub overtime_start: Option<DateTime<Utc>>,
    /// Start of the first work segment, if known.
    pub work_start: Option<DateTime<Utc>>,
    pub session_id: Option<SessionId>,
}

/// Derived quantities read at a single instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub at: DateTime<Utc>,
    pub state: SessionState,
    pub remaining_work: Duration,
    pub remaining_break: Duration,
    pub elapsed_overtime: Duration,
    pub total_work_done: Duration,
    pub total_break_taken: Duration,
    pub is_warning: bool,
    pub config: EngineConfig,
}

/// Core timer engine.
///
/// Single-threaded: commands, ticks, and reads are expected to come from one
/// logical sequence. The engine holds no lock and performs no I/O.
#[derive(Debug, Clone)]
pub struct TimerEngine<C> {
    clock: C,
    state: SessionState,
    config: EngineConfig,

    work_start: Option<DateTime<Utc>>,
    break_start: Option<DateTime<Utc>>,
    overtime_start: Option<DateTime<Utc>>,
    /// Open boundary of whichever segment is accruing time.
    current_segment_start: Option<DateTime<Utc>>,
    last_overtime_notify: Option<DateTime<Utc>>,

    /// Closed segments only.
    accumulated_work: Duration,
    accumulated_break: Duration,

    session_id: Option<SessionId>,
    final_totals: Option<SessionTotals>,
}

impl<C: Clock> TimerEngine<C> {
    /// Creates an idle engine with zero targets.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            state: SessionState::Idle,
            config: EngineConfig::default(),
            work_start: None,
            break_start: None,
            overtime_start: None,
            current_segment_start: None,
            last_overtime_notify: None,
            accumulated_work: Duration::zero(),
            accumulated_break: Duration::zero(),
            session_id: None,
            final_totals: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub const fn work_start(&self) -> Option<DateTime<Utc>> {
        self.work_start
    }

    pub const fn break_start(&self) -> Option<DateTime<Utc>> {
        self.break_start
    }

    pub const fn overtime_start(&self) -> Option<DateTime<Utc>> {
        self.overtime_start
    }

    pub const fn current_segment_start(&self) -> Option<DateTime<Utc>> {
        self.current_segment_start
    }

    /// Work accrued from closed segments only.
    pub const fn accumulated_work(&self) -> Duration {
        self.accumulated_work
    }

    /// Break accrued from closed segments only.
    pub const fn accumulated_break(&self) -> Duration {
        self.accumulated_break
    }

    /// Totals of the last session that was reset to `Idle`.
    ///
    /// Cleared when the next session starts.
    pub const fn final_totals(&self) -> Option<SessionTotals> {
        self.final_totals
    }

    /// Remaining work (countdown). Negative once past the target.
    pub fn remaining_work(&self) -> Duration {
        self.remaining_work_at(self.clock.now())
    }

    /// Remaining break (countdown).
    pub fn remaining_break(&self) -> Duration {
        self.remaining_break_at(self.clock.now())
    }

    /// Elapsed overtime (count-up). Zero outside `Overtime`.
    pub fn elapsed_overtime(&self) -> Duration {
        self.elapsed_overtime_at(self.clock.now())
    }

    /// Work done so far, including the open segment when working.
    pub fn total_work_done(&self) -> Duration {
        self.total_work_done_at(self.clock.now())
    }

    /// Break taken so far, including the open segment when on break.
    pub fn total_break_taken(&self) -> Duration {
        self.total_break_taken_at(self.clock.now())
    }

    /// Whether the current countdown is about to run out.
    pub fn is_warning(&self) -> bool {
        self.is_warning_at(self.clock.now())
    }

    /// All derived quantities at one instant.
    pub fn snapshot(&self) -> EngineSnapshot {
        let at = self.clock.now();
        EngineSnapshot {
            at,
            state: self.state,
            remaining_work: self.remaining_work_at(at),
            remaining_break: self.remaining_break_at(at),
            elapsed_overtime: self.elapsed_overtime_at(at),
            total_work_done: self.total_work_done_at(at),
            total_break_taken: self.total_break_taken_at(at),
            is_warning: self.is_warning_at(at),
            config: self.config,
        }
    }

    pub fn remaining_work_at(&self, now: DateTime<Utc>) -> Duration {
        if self.state == SessionState::Idle {
            return self.config.target_work;
        }
        self.config.target_work - self.total_work_done_at(now)
    }

    pub fn remaining_break_at(&self, now: DateTime<Utc>) -> Duration {
        self.config.target_break - self.total_break_taken_at(now)
    }

    pub fn elapsed_overtime_at(&self, now: DateTime<Utc>) -> Duration {
        match (self.state, self.overtime_start) {
            (SessionState::Overtime, Some(start)) => now - start,
            _ => Duration::zero(),
        }
    }

    pub fn total_work_done_at(&self, now: DateTime<Utc>) -> Duration {
        self.accumulated_work + self.live_elapsed(SessionState::Working, now)
    }

    pub fn total_break_taken_at(&self, now: DateTime<Utc>) -> Duration {
        self.accumulated_break + self.live_elapsed(SessionState::Break, now)
    }

    pub fn is_warning_at(&self, now: DateTime<Utc>) -> bool {
        let (remaining, threshold) = match self.state {
            SessionState::Working => (self.remaining_work_at(now), WORK_WARNING_THRESHOLD),
            SessionState::Break => (self.remaining_break_at(now), BREAK_WARNING_THRESHOLD),
            _ => return false,
        };
        remaining > Duration::zero() && remaining <= threshold
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Sets the session targets. Only valid while `Idle`.
    pub fn configure(
        &mut self,
        work_minutes: u32,
        break_minutes: u32,
        overtime_notify_minutes: u32,
    ) -> Result<(), EngineError> {
        if self.state != SessionState::Idle {
            return Err(EngineError::ConfigureWhileActive { state: self.state });
        }
        self.config = EngineConfig {
            target_work: Duration::minutes(i64::from(work_minutes)),
            target_break: Duration::minutes(i64::from(break_minutes)),
            overtime_notify_interval_minutes: overtime_notify_minutes,
        };
        tracing::debug!(
            work_minutes,
            break_minutes,
            overtime_notify_minutes,
            "configured timer"
        );
        Ok(())
    }

    /// Associates the running session with its persisted record.
    pub fn attach_session(&mut self, session_id: SessionId) {
        self.session_id = Some(session_id);
    }

    /// Runs any command from the transition table.
    pub fn execute(&mut self, command: Command) -> Result<Outbox, EngineError> {
        match command {
            Command::StartWork => self.start_work(),
            Command::StartBreak => self.start_break(),
            Command::EndBreakEarly => self.end_break_early(),
            Command::ResumeWork => self.resume_work(),
            Command::StartOvertime => self.start_overtime(),
            Command::StopOvertime => self.stop_overtime(),
            Command::EndDay => self.end_day(),
            Command::EndDayEarly => self.end_day_early(),
        }
    }

    pub fn start_work(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::StartWork)?;
        let now = outbox.at();
        self.work_start = Some(now);
        self.current_segment_start = Some(now);
        self.accumulated_work = Duration::zero();
        self.accumulated_break = Duration::zero();
        self.final_totals = None;
        self.enter(SessionState::Working, &mut outbox);
        Ok(outbox)
    }

    pub fn start_break(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::StartBreak)?;
        let now = outbox.at();
        self.close_segment(now);
        self.break_start = Some(now);
        self.current_segment_start = Some(now);
        self.enter(SessionState::Break, &mut outbox);
        Ok(outbox)
    }

    pub fn end_break_early(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::EndBreakEarly)?;
        let now = outbox.at();
        self.close_segment(now);
        self.current_segment_start = Some(now);
        self.enter(SessionState::Working, &mut outbox);
        Ok(outbox)
    }

    /// Starts a new work segment after the break timer ran out.
    ///
    /// The break segment was already closed when the break ended.
    pub fn resume_work(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::ResumeWork)?;
        self.current_segment_start = Some(outbox.at());
        self.enter(SessionState::Working, &mut outbox);
        Ok(outbox)
    }

    pub fn start_overtime(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::StartOvertime)?;
        let now = outbox.at();
        self.overtime_start = Some(now);
        self.current_segment_start = Some(now);
        self.last_overtime_notify = Some(now);
        self.enter(SessionState::Overtime, &mut outbox);
        Ok(outbox)
    }

    pub fn stop_overtime(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::StopOvertime)?;
        self.reset(&mut outbox);
        Ok(outbox)
    }

    pub fn end_day(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::EndDay)?;
        self.reset(&mut outbox);
        Ok(outbox)
    }

    pub fn end_day_early(&mut self) -> Result<Outbox, EngineError> {
        let mut outbox = self.guard(Command::EndDayEarly)?;
        self.close_segment(outbox.at());
        self.reset(&mut outbox);
        Ok(outbox)
    }

    /// Call periodically. Fires the autonomous transitions and reminders.
    ///
    /// Returns an empty outbox when no threshold was crossed.
    pub fn tick(&mut self) -> Outbox {
        let now = self.clock.now();
        let mut outbox = Outbox::new(now);
        match self.state {
            SessionState::Working if self.remaining_work_at(now) <= Duration::zero() => {
                self.close_segment(now);
                outbox.push(Notification::WorkCompleted);
                self.enter(SessionState::WorkCompleted, &mut outbox);
            }
            SessionState::Break if self.remaining_break_at(now) <= Duration::zero() => {
                self.close_segment(now);
                outbox.push(Notification::BreakEnded);
                self.enter(SessionState::BreakEndedWaitingUser, &mut outbox);
            }
            SessionState::Overtime => {
                let due = self
                    .config
                    .overtime_notify_interval()
                    .zip(self.last_overtime_notify)
                    .is_some_and(|(interval, last)| now - last >= interval);
                if due {
                    self.last_overtime_notify = Some(now);
                    let elapsed = self.elapsed_overtime_at(now);
                    tracing::debug!(elapsed_secs = elapsed.num_seconds(), "overtime reminder due");
                    outbox.push(Notification::OvertimeNotification { elapsed });
                }
            }
            _ => {}
        }
        outbox
    }

    /// Installs recovered state directly, bypassing the transition table.
    ///
    /// When restoring into `Overtime` the reminder timer restarts from now, so
    /// the first reminder is not fired immediately on resume.
    pub fn restore(&mut self, point: RestorePoint) -> Outbox {
        let now = self.clock.now();
        let mut outbox = Outbox::new(now);

        self.accumulated_work = point.accumulated_work;
        self.accumulated_break = point.accumulated_break;
        self.current_segment_start = point.current_segment_start;
        self.overtime_start = point.overtime_start;
        self.work_start = point.work_start;
        self.break_start = match point.state {
            SessionState::Break => point.current_segment_start,
            _ => None,
        };
        self.last_overtime_notify = (point.state == SessionState::Overtime).then_some(now);
        self.session_id = point.session_id;
        self.final_totals = None;

        tracing::debug!(
            state = %point.state,
            accumulated_work_secs = point.accumulated_work.num_seconds(),
            accumulated_break_secs = point.accumulated_break.num_seconds(),
            "restored engine state"
        );
        self.enter(point.state, &mut outbox);
        outbox
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Rejects `command` unless the engine is in its required state.
    fn guard(&self, command: Command) -> Result<Outbox, EngineError> {
        if self.state != command.required_state() {
            tracing::debug!(%command, state = %self.state, "rejected command");
            return Err(EngineError::InvalidTransition {
                command,
                state: self.state,
            });
        }
        Ok(Outbox::new(self.clock.now()))
    }

    fn enter(&mut self, to: SessionState, outbox: &mut Outbox) {
        let from = self.state;
        self.state = to;
        tracing::debug!(%from, %to, at = %outbox.at(), "state changed");
        outbox.push(Notification::StateChanged { from, to });
    }

    fn live_elapsed(&self, state: SessionState, now: DateTime<Utc>) -> Duration {
        match self.current_segment_start {
            Some(start) if self.state == state => now - start,
            _ => Duration::zero(),
        }
    }

    /// Folds the open segment into its accumulator and clears the boundary.
    fn close_segment(&mut self, now: DateTime<Utc>) {
        let Some(start) = self.current_segment_start.take() else {
            return;
        };
        let elapsed = now - start;
        match self.state {
            SessionState::Working => self.accumulated_work += elapsed,
            SessionState::Break => self.accumulated_break += elapsed,
            // Overtime is always measured from its own start.
            _ => {}
        }
    }

    fn reset(&mut self, outbox: &mut Outbox) {
        self.final_totals = Some(SessionTotals {
            work: self.accumulated_work,
            break_time: self.accumulated_break,
        });
        self.work_start = None;
        self.break_start = None;
        self.overtime_start = None;
        self.current_segment_start = None;
        self.last_overtime_notify = None;
        self.accumulated_work = Duration::zero();
        self.accumulated_break = Duration::zero();
        self.session_id = None;
        self.enter(SessionState::Idle, outbox);
    }
}
