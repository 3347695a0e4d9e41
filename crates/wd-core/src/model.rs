//! Persisted records exchanged with the storage collaborator.
//!
//! The core never stores these itself. It reads segment lists during recovery
//! and tells the caller, through the outbox, which segments to close and open.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{SegmentType, SessionState};
use crate::types::{SegmentId, SessionId};

/// A contiguous, typed interval of time within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub session_id: SessionId,
    pub segment_type: SegmentType,
    pub start: DateTime<Utc>,
    /// Unset while the segment is still accruing time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Whole seconds, written when the segment is closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

impl Segment {
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Duration of a closed segment.
    ///
    /// Prefers the stored `duration_seconds`, falling back to `end - start`.
    /// Returns `None` for an open segment.
    pub fn duration(&self) -> Option<Duration> {
        let end = self.end?;
        Some(
            self.duration_seconds
                .map_or_else(|| end - self.start, Duration::seconds),
        )
    }
}

/// One day's work/break/overtime tracking record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Local calendar date the session was started on (`YYYY-MM-DD`).
    pub date_local: String,
    pub target_work_minutes: u32,
    pub target_break_minutes: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// State persisted for recovery. Cleared when the session ends normally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_state: Option<SessionState>,
}

/// User preferences for new sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub work_duration_minutes: u32,
    pub break_duration_minutes: u32,
    /// Minutes between overtime reminders; 0 disables them.
    pub overtime_notify_interval_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration_minutes: 480,
            break_duration_minutes: 60,
            overtime_notify_interval_minutes: 30,
        }
    }
}

/// Closed-segment totals for one local date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date_local: String,
    pub total_work_seconds: i64,
    pub total_break_seconds: i64,
    pub total_overtime_seconds: i64,
}

impl DaySummary {
    pub const fn work(&self) -> Duration {
        Duration::seconds(self.total_work_seconds)
    }

    pub const fn break_time(&self) -> Duration {
        Duration::seconds(self.total_break_seconds)
    }

    pub const fn overtime(&self) -> Duration {
        Duration::seconds(self.total_overtime_seconds)
    }
}
