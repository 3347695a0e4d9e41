//! Core type definitions with validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A row identifier was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NonPositiveId { field: &'static str, value: i64 },

    /// The stored string does not name a session state.
    #[error("unknown session state: {value}")]
    UnknownSessionState { value: String },

    /// The stored string does not name a segment type.
    #[error("unknown segment type: {value}")]
    UnknownSegmentType { value: String },
}

/// Generates a validated row ID newtype with common trait implementations.
macro_rules! define_row_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: i64) -> Result<Self, ValidationError> {
                if id <= 0 {
                    return Err(ValidationError::NonPositiveId {
                        field: $field_name,
                        value: id,
                    });
                }
                Ok(Self(id))
            }

            /// Returns the raw row ID.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = ValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_row_id!(
    /// A validated session identifier.
    ///
    /// Session IDs are the positive row IDs assigned by the storage layer.
    SessionId, "session ID"
);

define_row_id!(
    /// A validated segment identifier.
    SegmentId, "segment ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_rejects_non_positive() {
        assert!(SessionId::new(0).is_err());
        assert!(SessionId::new(-4).is_err());
        assert_eq!(SessionId::new(7).unwrap().get(), 7);
    }

    #[test]
    fn segment_id_error_names_field() {
        let err = SegmentId::new(0).unwrap_err();
        assert_eq!(err.to_string(), "segment ID must be positive, got 0");
    }

    #[test]
    fn session_id_serde_roundtrip() {
        let id = SessionId::new(42).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let parsed: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn session_id_serde_rejects_zero() {
        let result: Result<SessionId, _> = serde_json::from_str("0");
        assert!(result.is_err());
    }
}
