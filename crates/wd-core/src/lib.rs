//! Core domain logic for the workday timer.
//!
//! This crate contains the fundamental types and logic for:
//! - Timer engine: the wall-clock-driven work/break/overtime state machine
//! - Recovery: rebuilding engine state from persisted segments after a restart
//! - Clock: the injected time source
//!
//! The crate performs no I/O. Storage and presentation live in `wd-db` and
//! `wd-cli`.

pub mod clock;
pub mod engine;
pub mod model;
pub mod notification;
pub mod recovery;
pub mod state;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    BREAK_WARNING_THRESHOLD, Command, EngineConfig, EngineError, EngineSnapshot, RestorePoint,
    SessionTotals, TimerEngine, WORK_WARNING_THRESHOLD,
};
pub use model::{DaySummary, Segment, Session, Settings};
pub use notification::{Notification, Outbox};
pub use recovery::{RecoveryError, reconstruct};
pub use state::{SegmentType, SessionState};
pub use types::{SegmentId, SessionId, ValidationError};
