//! Notifications raised by the engine.
//!
//! Every command and every tick returns an [`Outbox`]: the instant the engine
//! read from its clock plus the ordered notifications that call produced.
//! Callers decide how to present them and what to persist.

use chrono::{DateTime, Duration, Utc};

use crate::state::SessionState;

/// Something the caller should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The break countdown reached zero.
    BreakEnded,
    /// The work countdown reached zero.
    WorkCompleted,
    /// A periodic overtime reminder is due.
    OvertimeNotification {
        /// Overtime elapsed at the moment the reminder fired.
        elapsed: Duration,
    },
    /// Raised after every successful transition and after a restore.
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
}

/// Ordered notifications produced by one engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbox {
    at: DateTime<Utc>,
    notifications: Vec<Notification>,
}

impl Outbox {
    pub(crate) const fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            notifications: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    /// The instant the engine used for this call.
    ///
    /// Segments closed or opened in response must use this instant so that
    /// persisted durations match the engine's accumulators exactly.
    pub const fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    /// State changes in the order they happened, as `(from, to)` pairs.
    pub fn transitions(&self) -> impl Iterator<Item = (SessionState, SessionState)> + '_ {
        self.notifications.iter().filter_map(|n| match n {
            Notification::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
    }
}

impl IntoIterator for Outbox {
    type Item = Notification;
    type IntoIter = std::vec::IntoIter<Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.notifications.into_iter()
    }
}

impl<'a> IntoIterator for &'a Outbox {
    type Item = &'a Notification;
    type IntoIter = std::slice::Iter<'a, Notification>;

    fn into_iter(self) -> Self::IntoIter {
        self.notifications.iter()
    }
}
