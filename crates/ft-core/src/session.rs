//! Bookkeeping for the single remote time entry this process believes is open.

use chrono::{DateTime, Duration, Utc};

use crate::types::EntryId;

/// The remote entry currently believed to be running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub id: EntryId,
    /// Start time as reported by the remote service, not local capture time.
    pub started_at: DateTime<Utc>,
}

impl OpenSession {
    #[must_use]
    pub const fn new(id: EntryId, started_at: DateTime<Utc>) -> Self {
        Self { id, started_at }
    }

    /// Time elapsed between the session start and `now`. Never negative.
    #[must_use]
    pub fn elapsed_since(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }
}

/// Holds at most one [`OpenSession`].
///
/// Pure state: no I/O happens here. The time entry client records a session
/// after a successful start and takes it back out before any stop or delete,
/// whatever the outcome of that call.
#[derive(Debug, Default)]
pub struct SessionTracker {
    current: Option<OpenSession>,
}

impl SessionTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    #[must_use]
    pub const fn current(&self) -> Option<&OpenSession> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.current.is_some()
    }

    /// Records a newly opened session, returning any session it displaced.
    pub fn open(&mut self, session: OpenSession) -> Option<OpenSession> {
        self.current.replace(session)
    }

    /// Clears the open session and hands it to the caller.
    pub fn take(&mut self) -> Option<OpenSession> {
        self.current.take()
    }

    /// Elapsed time of the open session at `now`, or `None` when nothing is open.
    #[must_use]
    pub fn elapsed_since(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.current.as_ref().map(|s| s.elapsed_since(now))
    }
}
