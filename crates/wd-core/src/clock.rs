//! Time source capability.
//!
//! The engine never reads the system time directly. Every instant comes from a
//! [`Clock`] passed in at construction, so tests can drive time by hand.

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, SubsecRound, Utc};

/// A source of absolute, timezone-independent instants.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by the operating system.
///
/// Instants are truncated to whole seconds so that persisted segment
/// durations, which are stored in whole seconds, add up exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

/// Clock advanced manually, for tests.
///
/// Clones share the same instant, so a test can keep one handle while the
/// engine owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Rc::new(Cell::new(start)),
        }
    }

    /// Moves the clock forward (or backward, for a negative duration).
    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        let next = self.current.get() + by;
        self.current.set(next);
        next
    }

    /// Jumps to a specific instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        self.current.set(instant);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.current.get()
    }
}
