//! In-memory fakes of the core's seams, for tests.
//!
//! [`MockApi`] behaves like a single-user timesheet service: starting an
//! entry makes it the active one, stopping or deleting clears it. Every call
//! is recorded in order, and individual operations can be scripted to fail.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};

use crate::api::{ActiveEntry, ApiError, CreatedEntry, TimesheetApi};
use crate::notify::Notifier;
use crate::types::{ActivityKey, EntryId};

/// A request observed by [`MockApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Active,
    Start(ActivityKey, DateTime<Utc>),
    Stop(String),
    Delete(String),
    SetEnd(String, DateTime<Utc>),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<ApiCall>,
    active: Option<ActiveEntry>,
    next_id: u64,
    start_failures: u32,
    start_error: Option<ApiError>,
    lost_start_replies: u32,
    active_error: Option<ApiError>,
    stop_error: Option<ApiError>,
    delete_error: Option<ApiError>,
    set_end_error: Option<ApiError>,
}

/// Recording fake of the remote timesheet service.
#[derive(Debug, Clone, Default)]
pub struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `entry` the running entry without recording a call.
    pub fn with_active(self, entry: ActiveEntry) -> Self {
        self.state.lock().unwrap().active = Some(entry);
        self
    }

    /// Rejects the next `count` start requests with a 400.
    pub fn fail_starts(&self, count: u32) {
        self.state.lock().unwrap().start_failures = count;
    }

    /// Fails the next `count` start requests with `err`, creating nothing.
    pub fn fail_starts_with(&self, count: u32, err: ApiError) {
        let mut state = self.state.lock().unwrap();
        state.start_failures = count;
        state.start_error = Some(err);
    }

    /// Creates the entry for each of the next `count` start requests but
    /// answers with an unreadable response.
    pub fn lose_start_replies(&self, count: u32) {
        self.state.lock().unwrap().lost_start_replies = count;
    }

    pub fn fail_active(&self, err: ApiError) {
        self.state.lock().unwrap().active_error = Some(err);
    }

    pub fn fail_stop(&self, err: ApiError) {
        self.state.lock().unwrap().stop_error = Some(err);
    }

    pub fn fail_delete(&self, err: ApiError) {
        self.state.lock().unwrap().delete_error = Some(err);
    }

    pub fn fail_set_end(&self, err: ApiError) {
        self.state.lock().unwrap().set_end_error = Some(err);
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls other than active-entry queries.
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|call| *call != ApiCall::Active)
            .collect()
    }

    pub fn active_entry(&self) -> Option<ActiveEntry> {
        self.state.lock().unwrap().active.clone()
    }

    fn record(&self, call: ApiCall) -> std::sync::MutexGuard<'_, MockState> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
    }
}

/// Label the fake service reports for `key`.
pub fn label_for(key: ActivityKey) -> String {
    format!(
        "Customer: Project {} (Activity {})",
        key.project, key.activity
    )
}

#[async_trait]
impl TimesheetApi for MockApi {
    async fn active(&self) -> Result<Option<ActiveEntry>, ApiError> {
        let state = self.record(ApiCall::Active);
        if let Some(err) = &state.active_error {
            return Err(err.clone());
        }
        Ok(state.active.clone())
    }

    async fn start(
        &self,
        key: ActivityKey,
        begin: DateTime<Utc>,
    ) -> Result<CreatedEntry, ApiError> {
        let mut state = self.record(ApiCall::Start(key, begin));
        if state.start_failures > 0 {
            state.start_failures -= 1;
            return Err(state.start_error.clone().unwrap_or(ApiError::Status {
                status: 400,
                body: "Cannot stop running timesheet".to_string(),
            }));
        }
        state.next_id += 1;
        let id = EntryId::new(state.next_id.to_string())
            .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        // The service stores whole seconds.
        let begin = begin.with_nanosecond(0).unwrap_or(begin);
        state.active = Some(ActiveEntry {
            id: id.clone(),
            begin,
            activity: key,
            label: label_for(key),
        });
        if state.lost_start_replies > 0 {
            state.lost_start_replies -= 1;
            return Err(ApiError::InvalidResponse("truncated body".to_string()));
        }
        Ok(CreatedEntry { id, begin })
    }

    async fn stop(&self, id: &EntryId) -> Result<(), ApiError> {
        let mut state = self.record(ApiCall::Stop(id.to_string()));
        if let Some(err) = &state.stop_error {
            return Err(err.clone());
        }
        state.active = None;
        Ok(())
    }

    async fn delete(&self, id: &EntryId) -> Result<(), ApiError> {
        let mut state = self.record(ApiCall::Delete(id.to_string()));
        if let Some(err) = &state.delete_error {
            return Err(err.clone());
        }
        state.active = None;
        Ok(())
    }

    async fn set_end(&self, id: &EntryId, end: DateTime<Utc>) -> Result<(), ApiError> {
        let mut state = self.record(ApiCall::SetEnd(id.to_string(), end));
        if let Some(err) = &state.set_end_error {
            return Err(err.clone());
        }
        state.active = None;
        Ok(())
    }
}

/// Notifier that keeps every message.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any message body contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .any(|(_, message)| message.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    }
}
