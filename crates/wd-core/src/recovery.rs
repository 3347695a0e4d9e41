//! Rebuilding engine state from persisted segments.
//!
//! After a restart the only record of an unfinished session is its segment
//! log and the last persisted state. [`reconstruct`] folds the closed
//! segments into the accumulators and picks up the single open segment as the
//! live boundary. Input that does not describe exactly one consistent
//! position is rejected rather than guessed.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::clock::Clock;
use crate::engine::{RestorePoint, TimerEngine};
use crate::model::Segment;
use crate::notification::Outbox;
use crate::state::{SegmentType, SessionState};
use crate::types::SessionId;

/// Segment lists that cannot be mapped onto a single engine state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    /// An idle session has nothing to recover.
    #[error("session is idle; nothing to recover")]
    IdleSession,

    #[error("found {count} open segments; at most one may be open")]
    MultipleOpenSegments { count: usize },

    /// The state accrues time but no segment is open.
    #[error("state {state} requires an open segment but none was found")]
    MissingOpenSegment { state: SessionState },

    /// The state accrues no time but a segment is still open.
    #[error("state {state} has no open segment but a {segment_type} segment is open")]
    UnexpectedOpenSegment {
        state: SessionState,
        segment_type: SegmentType,
    },

    #[error("state {state} cannot resume an open {segment_type} segment")]
    SegmentTypeMismatch {
        state: SessionState,
        segment_type: SegmentType,
    },

    #[error("segment at position {index} has a negative duration")]
    NegativeDuration { index: usize },
}

/// Folds a session's segments into a [`RestorePoint`] for `state`.
///
/// Closed Work and Break segments feed the accumulators, preferring the stored
/// whole-second duration. Closed Overtime segments are ignored since overtime
/// is always measured live from its own start. The session ID is left unset.
pub fn reconstruct(
    state: SessionState,
    segments: &[Segment],
) -> Result<RestorePoint, RecoveryError> {
    if state == SessionState::Idle {
        return Err(RecoveryError::IdleSession);
    }

    let mut accumulated_work = Duration::zero();
    let mut accumulated_break = Duration::zero();
    let mut open: Vec<&Segment> = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let Some(duration) = segment.duration() else {
            open.push(segment);
            continue;
        };
        if duration < Duration::zero() {
            return Err(RecoveryError::NegativeDuration { index });
        }
        match segment.segment_type {
            SegmentType::Work => accumulated_work += duration,
            SegmentType::Break => accumulated_break += duration,
            SegmentType::Overtime => {}
        }
    }

    if open.len() > 1 {
        return Err(RecoveryError::MultipleOpenSegments { count: open.len() });
    }
    let current_segment_start = open_segment_start(state, open.first().copied())?;

    let overtime_start = match state {
        SessionState::Overtime => current_segment_start,
        _ => None,
    };
    let work_start = segments
        .iter()
        .find(|segment| segment.segment_type == SegmentType::Work)
        .map(|segment| segment.start);

    tracing::debug!(
        %state,
        segments = segments.len(),
        accumulated_work_secs = accumulated_work.num_seconds(),
        accumulated_break_secs = accumulated_break.num_seconds(),
        "reconstructed session"
    );

    Ok(RestorePoint {
        state,
        accumulated_work,
        accumulated_break,
        current_segment_start,
        overtime_start,
        work_start,
        session_id: None,
    })
}

fn open_segment_start(
    state: SessionState,
    open: Option<&Segment>,
) -> Result<Option<DateTime<Utc>>, RecoveryError> {
    match (state.segment_type(), open) {
        (Some(expected), Some(segment)) if segment.segment_type == expected => {
            Ok(Some(segment.start))
        }
        (Some(_), Some(segment)) => Err(RecoveryError::SegmentTypeMismatch {
            state,
            segment_type: segment.segment_type,
        }),
        (Some(_), None) => Err(RecoveryError::MissingOpenSegment { state }),
        (None, Some(segment)) => Err(RecoveryError::UnexpectedOpenSegment {
            state,
            segment_type: segment.segment_type,
        }),
        (None, None) => Ok(None),
    }
}

impl<C: Clock> TimerEngine<C> {
    /// Reconstructs a persisted session and restores it.
    ///
    /// On error the engine is left untouched.
    pub fn recover(
        &mut self,
        state: SessionState,
        session_id: SessionId,
        segments: &[Segment],
    ) -> Result<Outbox, RecoveryError> {
        let point = RestorePoint {
            session_id: Some(session_id),
            ..reconstruct(state, segments)?
        };
        Ok(self.restore(point))
    }
}
