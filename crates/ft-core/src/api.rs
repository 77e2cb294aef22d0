//! The remote time-tracking service as seen by the core.
//!
//! `ft-kimai` implements [`TimesheetApi`] over HTTP; tests use the in-memory
//! fake from [`crate::testing`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::{ActivityKey, EntryId};

/// Errors reported by a [`TimesheetApi`] implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The service could not be reached or the request timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status.
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service refused to close an entry because it ran longer than the
    /// configured maximum. `message` is the human-readable validation text,
    /// which may embed the maximum as `H:MM`.
    #[error("entry duration exceeds the maximum: {message}")]
    DurationExceeded { message: String },

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the service answered and refused the request, so nothing
    /// changed remotely.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::DurationExceeded { .. })
    }
}

/// The entry the remote service reports as currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveEntry {
    pub id: EntryId,
    pub begin: DateTime<Utc>,
    pub activity: ActivityKey,
    /// Human-readable "customer: project (activity)" description.
    pub label: String,
}

/// Result of creating an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEntry {
    pub id: EntryId,
    pub begin: DateTime<Utc>,
}

/// Timesheet operations against the remote service.
///
/// Each call is one request; retry and recovery policy lives in
/// [`crate::TimeEntryClient`].
#[async_trait]
pub trait TimesheetApi: Send + Sync {
    /// Currently running entry, if any.
    async fn active(&self) -> Result<Option<ActiveEntry>, ApiError>;

    /// Creates an entry for `key` beginning at `begin`.
    async fn start(&self, key: ActivityKey, begin: DateTime<Utc>)
    -> Result<CreatedEntry, ApiError>;

    /// Stops the entry at the current server time.
    async fn stop(&self, id: &EntryId) -> Result<(), ApiError>;

    /// Removes the entry entirely.
    async fn delete(&self, id: &EntryId) -> Result<(), ApiError>;

    /// Closes the entry with an explicit end time.
    async fn set_end(&self, id: &EntryId, end: DateTime<Utc>) -> Result<(), ApiError>;
}
