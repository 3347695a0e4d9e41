//! Storage layer for the workday timer.
//!
//! Provides persistence for sessions, segments, and settings using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2026-03-02T09:00:00.000Z`). Lexicographic ordering matches
//! chronological ordering, and values are always UTC.
//!
//! ## Segments
//!
//! A session's time is an append-only log of segments. At most one segment
//! per session is open (`end_at IS NULL`). Closing a segment writes its
//! whole-second duration, which recovery prefers over the bounds.
//!
//! ## Active State
//!
//! `sessions.active_state` holds the engine state while the session is
//! unfinished. It is NULL before the first transition and after the session
//! ends, so an interrupted session is one with a state and no `ended_at`.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use wd_core::{
    DaySummary, Segment, SegmentId, SegmentType, Session, SessionId, SessionState, Settings,
    ValidationError,
};

const WORK_DURATION_KEY: &str = "WorkDurationMinutes";
const BREAK_DURATION_KEY: &str = "BreakDurationMinutes";
const OVERTIME_NOTIFY_KEY: &str = "OvertimeNotifyIntervalMinutes";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored identifier or enum string failed validation.
    #[error("invalid stored value: {0}")]
    Validation(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {field}: {value}")]
    TimestampParse {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored number does not fit the target type.
    #[error("value out of range for {field}: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    /// No unfinished session with this ID exists.
    #[error("no unfinished session with id {0}")]
    SessionNotFound(SessionId),
    /// The stored state does not match the state being left.
    #[error("session {session_id} is in state {found}, expected {expected}")]
    StaleTransition {
        session_id: SessionId,
        expected: SessionState,
        found: SessionState,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        tracing::trace!("initializing schema");
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date_local TEXT NOT NULL,
                target_work_minutes INTEGER NOT NULL,
                target_break_minutes INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                ended_at TEXT,
                active_state TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date_local);

            -- type: one of the segment kinds that accrue time
            -- duration_seconds: whole seconds, set when the segment is closed
            CREATE TABLE IF NOT EXISTS segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('Work', 'Break', 'Overtime')),
                start_at TEXT NOT NULL,
                end_at TEXT,
                duration_seconds INTEGER,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_segments_session ON segments(session_id);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Sessions ─────────────────────────────────────────────────────

    /// Inserts a new session with no active state.
    ///
    /// The session becomes active once its first transition is recorded.
    pub fn create_session(
        &self,
        date_local: NaiveDate,
        target_work_minutes: u32,
        target_break_minutes: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Session, DbError> {
        let date_local = format_date(date_local);
        self.conn.execute(
            "
            INSERT INTO sessions (date_local, target_work_minutes, target_break_minutes, created_at)
            VALUES (?, ?, ?, ?)
            ",
            params![
                date_local,
                target_work_minutes,
                target_break_minutes,
                format_timestamp(created_at),
            ],
        )?;
        let id = SessionId::new(self.conn.last_insert_rowid())?;
        tracing::debug!(%id, %date_local, "created session");
        Ok(Session {
            id,
            date_local,
            target_work_minutes,
            target_break_minutes,
            created_at,
            ended_at: None,
            active_state: None,
        })
    }

    /// Overwrites the persisted state of an unfinished session.
    pub fn update_session_state(
        &self,
        id: SessionId,
        state: Option<SessionState>,
    ) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE sessions SET active_state = ? WHERE id = ? AND ended_at IS NULL",
            params![state.map(|s| s.as_str()), id.get()],
        )?;
        if updated == 0 {
            return Err(DbError::SessionNotFound(id));
        }
        Ok(())
    }

    /// Ends a session, closing any open segment at `ended_at`.
    pub fn end_session(&mut self, id: SessionId, ended_at: DateTime<Utc>) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        close_open_segments_in(&tx, id, ended_at)?;
        end_session_in(&tx, id, ended_at)?;
        tx.commit()?;
        tracing::debug!(%id, "ended session");
        Ok(())
    }

    /// Abandons a session without closing its segments.
    ///
    /// Open segments stay open, so the time since the interruption is never
    /// counted in day summaries.
    pub fn discard_session(&self, id: SessionId, ended_at: DateTime<Utc>) -> Result<(), DbError> {
        end_session_in(&self.conn, id, ended_at)?;
        tracing::debug!(%id, "discarded session");
        Ok(())
    }

    /// The most recent session that was interrupted before it ended.
    pub fn active_session(&self) -> Result<Option<Session>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, date_local, target_work_minutes, target_break_minutes,
                       created_at, ended_at, active_state
                FROM sessions
                WHERE active_state IS NOT NULL AND ended_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                ",
                [],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    pub fn session_by_id(&self, id: SessionId) -> Result<Option<Session>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, date_local, target_work_minutes, target_break_minutes,
                       created_at, ended_at, active_state
                FROM sessions
                WHERE id = ?
                ",
                [id.get()],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    // ── Segments ─────────────────────────────────────────────────────

    /// Opens a new segment.
    pub fn create_segment(
        &self,
        session_id: SessionId,
        segment_type: SegmentType,
        start: DateTime<Utc>,
    ) -> Result<Segment, DbError> {
        create_segment_in(&self.conn, session_id, segment_type, start)
    }

    /// Closes every open segment of a session at `at`. Returns how many were closed.
    pub fn close_open_segments(
        &self,
        session_id: SessionId,
        at: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        close_open_segments_in(&self.conn, session_id, at)
    }

    /// Lists a session's segments ordered by start time then ID.
    pub fn segments_for_session(&self, session_id: SessionId) -> Result<Vec<Segment>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, session_id, type, start_at, end_at, duration_seconds
            FROM segments
            WHERE session_id = ?
            ORDER BY start_at ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map([session_id.get()], SegmentRow::from_row)?;
        let mut segments = Vec::new();
        for row in rows {
            segments.push(row?.into_segment()?);
        }
        Ok(segments)
    }

    /// Persists one engine transition atomically.
    ///
    /// Closes the segment that `from` was accruing, opens one for `to`, and
    /// either stores `to` as the active state or, when `to` is `Idle`, ends the
    /// session. Fails with [`DbError::StaleTransition`] when the stored state is
    /// not `from`, leaving the database unchanged.
    pub fn record_transition(
        &mut self,
        session_id: SessionId,
        from: SessionState,
        to: SessionState,
        at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;

        let stored: Option<Option<String>> = tx
            .query_row(
                "SELECT active_state FROM sessions WHERE id = ? AND ended_at IS NULL",
                [session_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(stored) = stored else {
            return Err(DbError::SessionNotFound(session_id));
        };
        let found = match stored {
            Some(value) => value.parse()?,
            None => SessionState::Idle,
        };
        if found != from {
            return Err(DbError::StaleTransition {
                session_id,
                expected: from,
                found,
            });
        }

        if from.segment_type().is_some() {
            close_open_segments_in(&tx, session_id, at)?;
        }
        if let Some(segment_type) = to.segment_type() {
            create_segment_in(&tx, session_id, segment_type, at)?;
        }
        if to == SessionState::Idle {
            end_session_in(&tx, session_id, at)?;
        } else {
            tx.execute(
                "UPDATE sessions SET active_state = ? WHERE id = ?",
                params![to.as_str(), session_id.get()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(%session_id, %from, %to, "recorded transition");
        Ok(())
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Stores every setting, replacing previous values.
    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO settings (key, value) VALUES (?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                ",
            )?;
            for (key, value) in [
                (WORK_DURATION_KEY, settings.work_duration_minutes),
                (BREAK_DURATION_KEY, settings.break_duration_minutes),
                (OVERTIME_NOTIFY_KEY, settings.overtime_notify_interval_minutes),
            ] {
                stmt.execute(params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        tracing::debug!(?settings, "saved settings");
        Ok(())
    }

    /// Loads settings. Missing or unparseable values fall back to the defaults.
    pub fn load_settings(&self) -> Result<Settings, DbError> {
        let mut settings = Settings::default();
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            let slot = match key.as_str() {
                WORK_DURATION_KEY => &mut settings.work_duration_minutes,
                BREAK_DURATION_KEY => &mut settings.break_duration_minutes,
                OVERTIME_NOTIFY_KEY => &mut settings.overtime_notify_interval_minutes,
                _ => continue,
            };
            match value.trim().parse() {
                Ok(parsed) => *slot = parsed,
                Err(_) => tracing::warn!(%key, %value, "ignoring unparseable setting"),
            }
        }
        Ok(settings)
    }

    // ── Reporting ────────────────────────────────────────────────────

    /// Closed-segment totals per local date in `[from, to)`, newest first.
    pub fn day_summaries(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DaySummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT s.date_local,
                   COALESCE(SUM(CASE WHEN g.type = 'Work' THEN g.duration_seconds END), 0),
                   COALESCE(SUM(CASE WHEN g.type = 'Break' THEN g.duration_seconds END), 0),
                   COALESCE(SUM(CASE WHEN g.type = 'Overtime' THEN g.duration_seconds END), 0)
            FROM sessions s
            LEFT JOIN segments g ON g.session_id = s.id AND g.end_at IS NOT NULL
            WHERE s.date_local >= ? AND s.date_local < ?
            GROUP BY s.date_local
            ORDER BY s.date_local DESC
            ",
        )?;
        let rows = stmt.query_map(params![format_date(from), format_date(to)], |row| {
            Ok(DaySummary {
                date_local: row.get(0)?,
                total_work_seconds: row.get(1)?,
                total_break_seconds: row.get(2)?,
                total_overtime_seconds: row.get(3)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

struct SessionRow {
    id: i64,
    date_local: String,
    target_work_minutes: i64,
    target_break_minutes: i64,
    created_at: String,
    ended_at: Option<String>,
    active_state: Option<String>,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date_local: row.get(1)?,
            target_work_minutes: row.get(2)?,
            target_break_minutes: row.get(3)?,
            created_at: row.get(4)?,
            ended_at: row.get(5)?,
            active_state: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<Session, DbError> {
        Ok(Session {
            id: SessionId::new(self.id)?,
            date_local: self.date_local,
            target_work_minutes: to_minutes(self.target_work_minutes, "target_work_minutes")?,
            target_break_minutes: to_minutes(self.target_break_minutes, "target_break_minutes")?,
            created_at: parse_timestamp(&self.created_at, "created_at")?,
            ended_at: self
                .ended_at
                .as_deref()
                .map(|value| parse_timestamp(value, "ended_at"))
                .transpose()?,
            active_state: self
                .active_state
                .as_deref()
                .map(str::parse::<SessionState>)
                .transpose()?,
        })
    }
}

struct SegmentRow {
    id: i64,
    session_id: i64,
    kind: String,
    start_at: String,
    end_at: Option<String>,
    duration_seconds: Option<i64>,
}

impl SegmentRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            kind: row.get(2)?,
            start_at: row.get(3)?,
            end_at: row.get(4)?,
            duration_seconds: row.get(5)?,
        })
    }

    fn into_segment(self) -> Result<Segment, DbError> {
        Ok(Segment {
            id: SegmentId::new(self.id)?,
            session_id: SessionId::new(self.session_id)?,
            segment_type: self.kind.parse()?,
            start: parse_timestamp(&self.start_at, "start_at")?,
            end: self
                .end_at
                .as_deref()
                .map(|value| parse_timestamp(value, "end_at"))
                .transpose()?,
            duration_seconds: self.duration_seconds,
        })
    }
}

fn create_segment_in(
    conn: &Connection,
    session_id: SessionId,
    segment_type: SegmentType,
    start: DateTime<Utc>,
) -> Result<Segment, DbError> {
    conn.execute(
        "INSERT INTO segments (session_id, type, start_at) VALUES (?, ?, ?)",
        params![session_id.get(), segment_type.as_str(), format_timestamp(start)],
    )?;
    let id = SegmentId::new(conn.last_insert_rowid())?;
    tracing::debug!(%session_id, %id, %segment_type, "opened segment");
    Ok(Segment {
        id,
        session_id,
        segment_type,
        start,
        end: None,
        duration_seconds: None,
    })
}

fn close_open_segments_in(
    conn: &Connection,
    session_id: SessionId,
    at: DateTime<Utc>,
) -> Result<usize, DbError> {
    let open: Vec<(i64, String)> = {
        let mut stmt =
            conn.prepare("SELECT id, start_at FROM segments WHERE session_id = ? AND end_at IS NULL")?;
        let rows = stmt.query_map([session_id.get()], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect::<Result<_, _>>()?
    };

    let end_at = format_timestamp(at);
    for (id, start_at) in &open {
        let start = parse_timestamp(start_at, "start_at")?;
        let duration_seconds = (at - start).num_seconds();
        conn.execute(
            "UPDATE segments SET end_at = ?, duration_seconds = ? WHERE id = ?",
            params![end_at, duration_seconds, id],
        )?;
        tracing::debug!(%session_id, segment_id = id, duration_seconds, "closed segment");
    }
    Ok(open.len())
}

fn end_session_in(conn: &Connection, id: SessionId, ended_at: DateTime<Utc>) -> Result<(), DbError> {
    let updated = conn.execute(
        "UPDATE sessions SET ended_at = ?, active_state = NULL WHERE id = ? AND ended_at IS NULL",
        params![format_timestamp(ended_at), id.get()],
    )?;
    if updated == 0 {
        return Err(DbError::SessionNotFound(id));
    }
    Ok(())
}

fn to_minutes(value: i64, field: &'static str) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::OutOfRange { field, value })
}

fn parse_timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            field,
            value: value.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
