//! The engine bound to its store.
//!
//! A [`Tracker`] restores the active session from the database on load and
//! writes every state change the engine reports back through
//! `Database::record_transition`, at the instant the engine used.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, Utc};
use wd_core::{Clock, Command, Outbox, SessionId, SessionState, Settings, TimerEngine};
use wd_db::{Database, DbError};

pub struct Tracker<C> {
    db: Database,
    engine: TimerEngine<C>,
}

impl<C: Clock + Clone> Tracker<C> {
    /// Loads the tracker, recovering any interrupted session.
    ///
    /// Fails if the stored session cannot be reconstructed. Nothing is
    /// guessed; `wd discard` abandons such a session.
    pub fn load(db: Database, clock: C) -> Result<Self> {
        let engine = restore_engine(&db, clock)?;
        Ok(Self { db, engine })
    }

    pub const fn engine(&self) -> &TimerEngine<C> {
        &self.engine
    }

    pub const fn database(&self) -> &Database {
        &self.db
    }

    pub const fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Starts a new session with the given targets.
    pub fn start(&mut self, settings: &Settings) -> Result<Outbox> {
        let state = self.engine.state();
        if state != SessionState::Idle {
            bail!("a session is already running ({})", state.label());
        }
        self.engine.configure(
            settings.work_duration_minutes,
            settings.break_duration_minutes,
            settings.overtime_notify_interval_minutes,
        )?;
        let outbox = self.engine.start_work()?;

        let date_local = outbox.at().with_timezone(&Local).date_naive();
        let session = self
            .db
            .create_session(
                date_local,
                settings.work_duration_minutes,
                settings.break_duration_minutes,
                outbox.at(),
            )
            .context("failed to create session")?;
        self.engine.attach_session(session.id);
        tracing::info!(session_id = %session.id, %date_local, "started session");

        self.persist(session.id, &outbox)?;
        Ok(outbox)
    }

    /// Runs a command and persists the resulting transitions.
    pub fn execute(&mut self, command: Command) -> Result<Outbox> {
        // Resets detach the session, so capture it first.
        let session_id = self.engine.session_id();
        let outbox = self.engine.execute(command)?;
        if let Some(session_id) = session_id {
            self.persist(session_id, &outbox)?;
        }
        Ok(outbox)
    }

    /// Ticks the engine and persists any autonomous transition.
    pub fn tick(&mut self) -> Result<Outbox> {
        let outbox = self.engine.tick();
        if let Some(session_id) = self.engine.session_id() {
            self.persist(session_id, &outbox)?;
        }
        Ok(outbox)
    }

    /// Ticks like [`Self::tick`], but reloads instead of failing when
    /// another process changed the session first.
    ///
    /// Returns `None` after a reload; the engine then reflects the database.
    pub fn tick_shared(&mut self) -> Result<Option<Outbox>> {
        let outbox = self.engine.tick();
        let Some(session_id) = self.engine.session_id() else {
            return Ok(Some(outbox));
        };
        match self.persist(session_id, &outbox) {
            Ok(()) => Ok(Some(outbox)),
            Err(err) if lost_race(&err) => {
                tracing::info!(%session_id, error = %err, "session changed underneath us, reloading");
                self.reload()?;
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Reloads from the database if another process changed the session.
    ///
    /// A change is a different session, state, or open segment, so a break
    /// taken and ended elsewhere is noticed too. Returns whether a reload
    /// happened.
    pub fn refresh(&mut self) -> Result<bool> {
        let stored = self.stored_position()?;
        let current = self.engine.session_id().map(|id| {
            (
                id,
                Some(self.engine.state()),
                self.engine.current_segment_start(),
            )
        });
        if stored == current {
            return Ok(false);
        }
        tracing::debug!(?stored, ?current, "session changed in the database");
        self.reload()?;
        Ok(true)
    }

    fn stored_position(&self) -> Result<Option<Position>> {
        let Some(session) = self
            .db
            .active_session()
            .context("failed to load active session")?
        else {
            return Ok(None);
        };
        let open_start = self
            .db
            .segments_for_session(session.id)
            .context("failed to load segments")?
            .iter()
            .rev()
            .find(|segment| segment.is_open())
            .map(|segment| segment.start);
        Ok(Some((session.id, session.active_state, open_start)))
    }

    fn reload(&mut self) -> Result<()> {
        self.engine = restore_engine(&self.db, self.engine.clock().clone())?;
        Ok(())
    }

    fn persist(&mut self, session_id: SessionId, outbox: &Outbox) -> Result<()> {
        for (from, to) in outbox.transitions() {
            self.db
                .record_transition(session_id, from, to, outbox.at())
                .with_context(|| format!("failed to record {from} -> {to}"))?;
        }
        Ok(())
    }
}

/// Session, stored state, and start of the open segment.
type Position = (SessionId, Option<SessionState>, Option<DateTime<Utc>>);

/// Whether a failed write means another process got to the session first.
fn lost_race(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<DbError>(),
        Some(DbError::StaleTransition { .. } | DbError::SessionNotFound(_))
    )
}

fn restore_engine<C: Clock>(db: &Database, clock: C) -> Result<TimerEngine<C>> {
    let mut engine = TimerEngine::new(clock);
    let Some(session) = db
        .active_session()
        .context("failed to load active session")?
    else {
        return Ok(engine);
    };
    let Some(state) = session.active_state else {
        return Ok(engine);
    };

    let settings = db.load_settings().context("failed to load settings")?;
    engine.configure(
        session.target_work_minutes,
        session.target_break_minutes,
        settings.overtime_notify_interval_minutes,
    )?;
    let segments = db
        .segments_for_session(session.id)
        .context("failed to load segments")?;
    engine
        .recover(state, session.id, &segments)
        .with_context(|| {
            format!(
                "session {} cannot be recovered; run `wd discard` to abandon it",
                session.id
            )
        })?;
    tracing::info!(session_id = %session.id, %state, "recovered session");
    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use wd_core::{ManualClock, Notification, SegmentType};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    fn settings(work: u32, brk: u32, notify: u32) -> Settings {
        Settings {
            work_duration_minutes: work,
            break_duration_minutes: brk,
            overtime_notify_interval_minutes: notify,
        }
    }

    fn file_db(dir: &tempfile::TempDir) -> Database {
        Database::open(&dir.path().join("workday.db")).unwrap()
    }

    #[test]
    fn start_creates_an_active_session() {
        let clock = ManualClock::new(t0());
        let mut tracker = Tracker::load(Database::open_in_memory().unwrap(), clock).unwrap();
        tracker.start(&settings(480, 60, 30)).unwrap();

        let session = tracker.database().active_session().unwrap().unwrap();
        assert_eq!(session.active_state, Some(SessionState::Working));
        assert_eq!(session.target_work_minutes, 480);
        assert_eq!(tracker.engine().session_id(), Some(session.id));

        let segments = tracker.database().segments_for_session(session.id).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, t0());
    }

    #[test]
    fn start_while_running_is_refused() {
        let clock = ManualClock::new(t0());
        let mut tracker = Tracker::load(Database::open_in_memory().unwrap(), clock).unwrap();
        tracker.start(&settings(480, 60, 30)).unwrap();
        let err = tracker.start(&settings(480, 60, 30)).unwrap_err();
        assert_eq!(err.to_string(), "a session is already running (working)");
    }

    #[test]
    fn rejected_command_writes_nothing() {
        let clock = ManualClock::new(t0());
        let mut tracker = Tracker::load(Database::open_in_memory().unwrap(), clock).unwrap();
        tracker.start(&settings(480, 60, 30)).unwrap();
        assert!(tracker.execute(Command::ResumeWork).is_err());

        let session = tracker.database().active_session().unwrap().unwrap();
        assert_eq!(session.active_state, Some(SessionState::Working));
        let segments = tracker.database().segments_for_session(session.id).unwrap();
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn each_process_picks_up_where_the_last_one_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        let mut first = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        first.start(&settings(1, 1, 1)).unwrap();
        drop(first);

        clock.advance(Duration::seconds(30));
        let mut second = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        second.execute(Command::StartBreak).unwrap();
        drop(second);

        clock.advance(Duration::seconds(70));
        let mut third = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        assert_eq!(third.engine().state(), SessionState::Break);
        let outbox = third.tick().unwrap();
        assert_eq!(
            outbox.notifications()[0],
            Notification::BreakEnded,
            "break timer ran out while no process was running"
        );
        third.execute(Command::ResumeWork).unwrap();
        drop(third);

        clock.advance(Duration::seconds(30));
        let mut fourth = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        assert_eq!(fourth.engine().total_work_done(), Duration::seconds(60));
        assert_eq!(fourth.engine().total_break_taken(), Duration::seconds(70));
        fourth.tick().unwrap();
        assert_eq!(fourth.engine().state(), SessionState::WorkCompleted);
        let session_id = fourth.engine().session_id().unwrap();
        fourth.execute(Command::EndDay).unwrap();

        let session = fourth.database().session_by_id(session_id).unwrap().unwrap();
        assert_eq!(session.ended_at, Some(t0() + Duration::seconds(130)));
        let types: Vec<_> = fourth
            .database()
            .segments_for_session(session_id)
            .unwrap()
            .into_iter()
            .map(|s| (s.segment_type, s.duration_seconds))
            .collect();
        assert_eq!(
            types,
            vec![
                (SegmentType::Work, Some(30)),
                (SegmentType::Break, Some(70)),
                (SegmentType::Work, Some(30)),
            ]
        );
    }

    #[test]
    fn refresh_notices_changes_from_another_process() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        let mut watcher = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        assert!(!watcher.refresh().unwrap());

        let mut other = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        other.start(&settings(60, 15, 0)).unwrap();

        assert!(watcher.refresh().unwrap());
        assert_eq!(watcher.engine().state(), SessionState::Working);
        assert!(!watcher.refresh().unwrap());

        clock.advance(Duration::seconds(5));
        other.execute(Command::EndDayEarly).unwrap();
        assert!(watcher.refresh().unwrap());
        assert_eq!(watcher.engine().state(), SessionState::Idle);
    }

    #[test]
    fn refresh_notices_a_break_taken_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        let mut other = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        other.start(&settings(60, 15, 0)).unwrap();
        let mut watcher = Tracker::load(file_db(&dir), clock.clone()).unwrap();

        clock.advance(Duration::minutes(10));
        other.execute(Command::StartBreak).unwrap();
        clock.advance(Duration::minutes(5));
        other.execute(Command::EndBreakEarly).unwrap();

        // Same session, same state, but a different open segment.
        assert!(watcher.refresh().unwrap());
        assert_eq!(watcher.engine().state(), SessionState::Working);
        assert_eq!(watcher.engine().total_work_done(), Duration::minutes(10));
        assert_eq!(watcher.engine().total_break_taken(), Duration::minutes(5));
        assert!(!watcher.refresh().unwrap());
    }

    #[test]
    fn tick_shared_reloads_when_another_process_wrote_first() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        let mut other = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        other.start(&settings(1, 1, 0)).unwrap();
        let mut watcher = Tracker::load(file_db(&dir), clock.clone()).unwrap();

        clock.advance(Duration::seconds(61));
        other.tick().unwrap();
        other.execute(Command::StartOvertime).unwrap();

        // The watcher still thinks it is working and tries to record completion.
        assert!(watcher.tick_shared().unwrap().is_none());
        assert_eq!(watcher.engine().state(), SessionState::Overtime);
        assert_eq!(watcher.engine().overtime_start(), Some(t0() + Duration::seconds(61)));

        let session = watcher.database().active_session().unwrap().unwrap();
        assert_eq!(session.active_state, Some(SessionState::Overtime));
    }

    #[test]
    fn plain_tick_reports_a_session_ended_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());

        let mut other = Tracker::load(file_db(&dir), clock.clone()).unwrap();
        other.start(&settings(1, 1, 0)).unwrap();
        let mut watcher = Tracker::load(file_db(&dir), clock.clone()).unwrap();

        clock.advance(Duration::seconds(30));
        other.execute(Command::EndDayEarly).unwrap();
        clock.advance(Duration::seconds(31));

        let err = watcher.tick().unwrap_err();
        assert!(lost_race(&err), "{err:#}");
        assert!(watcher.refresh().unwrap());
        assert_eq!(watcher.engine().state(), SessionState::Idle);
    }

    #[test]
    fn corrupt_session_is_reported() {
        let db = Database::open_in_memory().unwrap();
        let session = db
            .create_session(t0().date_naive(), 60, 15, t0())
            .unwrap();
        // Claims to be on break but the log has no open segment.
        db.update_session_state(session.id, Some(SessionState::Break))
            .unwrap();

        let err = Tracker::load(db, ManualClock::new(t0()))
            .err()
            .expect("recovery should fail");
        let message = format!("{err:#}");
        assert!(message.contains("cannot be recovered"), "{message}");
        assert!(message.contains("requires an open segment"), "{message}");
    }
}
