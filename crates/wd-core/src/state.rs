//! Session states and segment types as the single source of truth for their stored strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// The state of the active workday session. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Working,
    Break,
    /// The break timer ran out and the user has not resumed work yet.
    BreakEndedWaitingUser,
    /// The work target was reached; the user may start overtime or end the day.
    WorkCompleted,
    Overtime,
}

impl SessionState {
    /// All states, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Working,
        Self::Break,
        Self::BreakEndedWaitingUser,
        Self::WorkCompleted,
        Self::Overtime,
    ];

    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Working => "Working",
            Self::Break => "Break",
            Self::BreakEndedWaitingUser => "BreakEndedWaitingUser",
            Self::WorkCompleted => "WorkCompleted",
            Self::Overtime => "Overtime",
        }
    }

    /// The type of segment that accrues time while in this state.
    ///
    /// `None` for states with no open segment.
    #[must_use]
    pub const fn segment_type(self) -> Option<SegmentType> {
        match self {
            Self::Working => Some(SegmentType::Work),
            Self::Break => Some(SegmentType::Break),
            Self::Overtime => Some(SegmentType::Overtime),
            Self::Idle | Self::BreakEndedWaitingUser | Self::WorkCompleted => None,
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Break => "on break",
            Self::BreakEndedWaitingUser => "break over, waiting to resume",
            Self::WorkCompleted => "work target reached",
            Self::Overtime => "overtime",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownSessionState {
                value: s.to_string(),
            })
    }
}

impl Serialize for SessionState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SessionState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The category a persisted time segment is counted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    Work,
    Break,
    Overtime,
}

impl SegmentType {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "Work",
            Self::Break => "Break",
            Self::Overtime => "Overtime",
        }
    }
}

impl fmt::Display for SegmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Work" => Ok(Self::Work),
            "Break" => Ok(Self::Break),
            "Overtime" => Ok(Self::Overtime),
            _ => Err(ValidationError::UnknownSegmentType {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_state_roundtrips_through_str() {
        for state in SessionState::ALL {
            let parsed: SessionState = state.as_str().parse().expect("should parse");
            assert_eq!(parsed, state);
        }
    }

    #[test]
    fn unknown_session_state_errors() {
        let err = "Sleeping".parse::<SessionState>().unwrap_err();
        assert_eq!(err.to_string(), "unknown session state: Sleeping");
    }

    #[test]
    fn only_accruing_states_have_segment_types() {
        assert_eq!(SessionState::Working.segment_type(), Some(SegmentType::Work));
        assert_eq!(SessionState::Break.segment_type(), Some(SegmentType::Break));
        assert_eq!(
            SessionState::Overtime.segment_type(),
            Some(SegmentType::Overtime)
        );
        assert_eq!(SessionState::Idle.segment_type(), None);
        assert_eq!(SessionState::BreakEndedWaitingUser.segment_type(), None);
        assert_eq!(SessionState::WorkCompleted.segment_type(), None);
    }

    #[test]
    fn session_state_serializes_as_stored_string() {
        let json = serde_json::to_string(&SessionState::BreakEndedWaitingUser).unwrap();
        assert_eq!(json, "\"BreakEndedWaitingUser\"");
        let parsed: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, SessionState::BreakEndedWaitingUser);
    }

    #[test]
    fn segment_type_from_str() {
        assert_eq!("Work".parse::<SegmentType>().unwrap(), SegmentType::Work);
        assert_eq!(
            "Overtime".parse::<SegmentType>().unwrap(),
            SegmentType::Overtime
        );
        assert!("work".parse::<SegmentType>().is_err());
    }
}
