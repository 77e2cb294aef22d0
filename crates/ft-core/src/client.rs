//! Retry and recovery policy around the remote timesheet operations.
//!
//! [`TimeEntryClient`] owns the [`SessionTracker`] and guarantees that at
//! most one remote entry is believed open at a time:
//!
//! - `start` closes any open session before creating a new entry and retries
//!   creation a bounded number of times while the service rejects it. Other
//!   failures are not retried: the entry may exist, so the running entry is
//!   looked up and adopted instead.
//! - `stop` deletes entries shorter than the short-session threshold instead
//!   of stopping them, and when the service rejects a stop because the entry
//!   ran past its maximum duration, closes it at `start + maximum` instead.
//! - Every stop or delete clears the local session, whatever the outcome.
//!
//! Failures are logged and reported through the [`Notifier`] before being
//! returned, so callers only need to decide what to do next.

use std::sync::{Arc, LazyLock};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use thiserror::Error;

use crate::api::{ActiveEntry, ApiError, TimesheetApi};
use crate::notify::{self, Notifier, TITLE, TITLE_ERROR, TITLE_NOTICE};
use crate::session::{OpenSession, SessionTracker};
use crate::types::{ActivityKey, EntryId};

/// Matches the `H:MM` maximum embedded in a duration validation message.
static DURATION_HINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

/// Time entry operation errors.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("could not read the active entry: {0}")]
    Fetch(#[source] ApiError),

    #[error("could not start {key} after {attempts} attempts: {source}")]
    Start {
        key: ActivityKey,
        attempts: u32,
        #[source]
        source: ApiError,
    },

    #[error("could not stop entry {id}: {source}")]
    Stop {
        id: EntryId,
        #[source]
        source: ApiError,
    },

    #[error("could not delete entry {id}: {source}")]
    Delete {
        id: EntryId,
        #[source]
        source: ApiError,
    },

    #[error("could not close entry {id} at its maximum duration: {source}")]
    Correct {
        id: EntryId,
        #[source]
        source: ApiError,
    },
}

/// Tunables for [`TimeEntryClient`].
#[derive(Debug, Clone)]
pub struct ClientPolicy {
    /// Total attempts for a single start, including the first.
    pub start_attempts: u32,
    /// Pause before the third and later start attempts.
    pub start_retry_delay: StdDuration,
    /// Sessions shorter than this are deleted instead of stopped.
    pub short_session: Duration,
    /// Maximum assumed when a duration rejection carries no `H:MM` hint.
    pub fallback_max_duration: Duration,
}

impl Default for ClientPolicy {
    fn default() -> Self {
        Self {
            start_attempts: 3,
            start_retry_delay: StdDuration::from_secs(1),
            short_session: Duration::seconds(60),
            fallback_max_duration: Duration::hours(8),
        }
    }
}

impl ClientPolicy {
    /// Whether a session that ran for `elapsed` counts as an accidental flip.
    #[must_use]
    pub fn is_short_session(&self, elapsed: Duration) -> bool {
        elapsed < self.short_session
    }

    /// Maximum duration named by a rejection message, or the fallback.
    #[must_use]
    pub fn max_duration_from(&self, message: &str) -> Duration {
        parse_duration_hint(message).unwrap_or(self.fallback_max_duration)
    }
}

/// How an open session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Closed at the current server time.
    Stopped,
    /// Removed because it was shorter than the short-session threshold.
    Deleted,
    /// Closed at `start + duration` after a maximum-duration rejection.
    Corrected { duration: Duration },
}

/// Policy layer over a [`TimesheetApi`].
pub struct TimeEntryClient<A> {
    api: A,
    sessions: SessionTracker,
    policy: ClientPolicy,
    notifier: Arc<dyn Notifier>,
}

impl<A: TimesheetApi> TimeEntryClient<A> {
    pub fn new(api: A, policy: ClientPolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            sessions: SessionTracker::new(),
            policy,
            notifier,
        }
    }

    pub const fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    /// Queries the entry the service currently considers running.
    ///
    /// Does not touch the local session; see [`Self::adopt`].
    pub async fn fetch_active(&self) -> Result<Option<ActiveEntry>, EntryError> {
        match self.api.active().await {
            Ok(active) => Ok(active),
            Err(err) => {
                tracing::error!(error = %err, "failed to read active entry");
                self.notifier
                    .notify(TITLE_ERROR, "Could not read current activity!");
                Err(EntryError::Fetch(err))
            }
        }
    }

    /// Records a remotely running entry as the open session.
    pub fn adopt(&mut self, entry: &ActiveEntry) {
        tracing::info!(id = %entry.id, begin = %entry.begin, "adopting running entry");
        self.sessions
            .open(OpenSession::new(entry.id.clone(), entry.begin));
    }

    /// Closes any open session, then starts a new entry for `key`.
    ///
    /// On success the new entry is the open session. On failure no session
    /// is recorded. Only rejections are retried.
    pub async fn start(&mut self, key: ActivityKey) -> Result<OpenSession, EntryError> {
        // Result already reported; a failed close must not block the start.
        let _ = self.stop().await;

        let attempts = self.policy.start_attempts.max(1);
        let mut attempt = 0;
        let created = loop {
            attempt += 1;
            if attempt > 2 {
                tokio::time::sleep(self.policy.start_retry_delay).await;
            }
            let err = match self.api.start(key, Utc::now()).await {
                Ok(created) => break created,
                Err(err) => err,
            };
            if err.is_rejection() && attempt < attempts {
                tracing::warn!(%key, attempt, error = %err, "start rejected, retrying");
                continue;
            }
            // Anything but a rejection may have created the entry anyway.
            if !err.is_rejection() {
                if let Some(entry) = self.find_started(key).await {
                    tracing::warn!(
                        %key,
                        id = %entry.id,
                        error = %err,
                        "start reply lost, adopting entry"
                    );
                    self.adopt(&entry);
                    self.notifier
                        .notify(TITLE, &notify::tracking_message(&entry));
                    return Ok(OpenSession::new(entry.id, entry.begin));
                }
            }
            tracing::error!(%key, attempt, error = %err, "start failed");
            self.notifier.notify(TITLE_ERROR, "Could not start activity!");
            return Err(EntryError::Start {
                key,
                attempts: attempt,
                source: err,
            });
        };

        let mut session = OpenSession::new(created.id, created.begin);
        // The created entry lacks customer details; the active listing has
        // them and carries the authoritative begin.
        match self.api.active().await {
            Ok(Some(active)) if active.id == session.id => {
                session.started_at = active.begin;
                self.notifier
                    .notify(TITLE, &notify::tracking_message(&active));
            }
            Ok(_) => {
                tracing::warn!(id = %session.id, "started entry missing from active listing");
                self.notifier.notify(TITLE, &format!("Started {key}"));
            }
            Err(err) => {
                tracing::warn!(id = %session.id, error = %err, "could not confirm started entry");
                self.notifier.notify(TITLE, &format!("Started {key}"));
            }
        }

        tracing::info!(id = %session.id, %key, begin = %session.started_at, "entry started");
        self.sessions.open(session.clone());
        Ok(session)
    }

    /// The running entry for `key`, if the service has one.
    async fn find_started(&self, key: ActivityKey) -> Option<ActiveEntry> {
        match self.api.active().await {
            Ok(Some(entry)) if entry.activity == key => Some(entry),
            Ok(_) => None,
            Err(err) => {
                tracing::warn!(%key, error = %err, "could not look for the started entry");
                None
            }
        }
    }

    /// Closes the open session, if any.
    ///
    /// Returns `Ok(None)` when nothing was open. The session is cleared
    /// before any request is made.
    pub async fn stop(&mut self) -> Result<Option<StopOutcome>, EntryError> {
        let elapsed = self.sessions.elapsed_since(Utc::now());
        let (Some(session), Some(elapsed)) = (self.sessions.take(), elapsed) else {
            return Ok(None);
        };

        if self.policy.is_short_session(elapsed) {
            tracing::info!(
                id = %session.id,
                elapsed_secs = elapsed.num_seconds(),
                "short session, deleting"
            );
            self.delete_entry(&session.id).await?;
            return Ok(Some(StopOutcome::Deleted));
        }

        match self.api.stop(&session.id).await {
            Ok(()) => {
                tracing::info!(id = %session.id, "entry stopped");
                Ok(Some(StopOutcome::Stopped))
            }
            Err(ApiError::DurationExceeded { message }) => {
                self.correct(&session, &message).await.map(Some)
            }
            Err(err) => {
                tracing::error!(id = %session.id, error = %err, "stop failed");
                self.notifier.notify(TITLE_ERROR, "Could not stop activity!");
                Err(EntryError::Stop {
                    id: session.id,
                    source: err,
                })
            }
        }
    }

    /// Deletes an entry outright, clearing the open session if it is `id`.
    pub async fn delete(&mut self, id: &EntryId) -> Result<(), EntryError> {
        if self.sessions.current().is_some_and(|s| &s.id == id) {
            self.sessions.take();
        }
        self.delete_entry(id).await
    }

    async fn delete_entry(&self, id: &EntryId) -> Result<(), EntryError> {
        match self.api.delete(id).await {
            Ok(()) => {
                tracing::info!(%id, "entry deleted");
                Ok(())
            }
            Err(err) => {
                tracing::error!(%id, error = %err, "delete failed");
                self.notifier.notify(TITLE_ERROR, "Could not delete activity!");
                Err(EntryError::Delete {
                    id: id.clone(),
                    source: err,
                })
            }
        }
    }

    async fn correct(
        &self,
        session: &OpenSession,
        message: &str,
    ) -> Result<StopOutcome, EntryError> {
        let duration = self.policy.max_duration_from(message);
        let end = session.started_at + duration;
        tracing::warn!(
            id = %session.id,
            %message,
            %end,
            "entry exceeded maximum duration, closing at the limit"
        );

        match self.api.set_end(&session.id, end).await {
            Ok(()) => {
                self.notifier.notify(
                    TITLE_NOTICE,
                    &format!(
                        "Stopping previous activity after {}h",
                        format_hours(duration)
                    ),
                );
                Ok(StopOutcome::Corrected { duration })
            }
            Err(err) => {
                tracing::error!(id = %session.id, error = %err, "correction failed");
                self.notifier
                    .notify(TITLE_ERROR, "Could not modify previous activity!");
                Err(EntryError::Correct {
                    id: session.id.clone(),
                    source: err,
                })
            }
        }
    }
}

/// Extracts the first `H:MM` duration from `message`.
pub fn parse_duration_hint(message: &str) -> Option<Duration> {
    let caps = DURATION_HINT_RE.captures(message)?;
    let hours: i64 = caps[1].parse().ok()?;
    let minutes: i64 = caps[2].parse().ok()?;
    if minutes >= 60 {
        return None;
    }
    Some(Duration::hours(hours) + Duration::minutes(minutes))
}

#[expect(
    clippy::cast_precision_loss,
    reason = "durations here are a few hours at most"
)]
fn format_hours(duration: Duration) -> String {
    let hours = duration.num_minutes() as f64 / 60.0;
    format!("{hours}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiCall, MockApi, RecordingNotifier, label_for};

    fn policy() -> ClientPolicy {
        ClientPolicy {
            start_retry_delay: StdDuration::ZERO,
            ..ClientPolicy::default()
        }
    }

    fn client(api: &MockApi, notifier: &RecordingNotifier) -> TimeEntryClient<MockApi> {
        TimeEntryClient::new(api.clone(), policy(), Arc::new(notifier.clone()))
    }

    fn open_for(client: &mut TimeEntryClient<MockApi>, id: &str, age: Duration) {
        client.sessions.open(OpenSession::new(
            EntryId::new(id).unwrap(),
            Utc::now() - age,
        ));
    }

    #[test]
    fn duration_hint_parses_hours_and_minutes() {
        assert_eq!(
            parse_duration_hint("Maximum 2:30 exceeded"),
            Some(Duration::minutes(150))
        );
        assert_eq!(
            parse_duration_hint("Maximum duration of 10:00 hours exceeded"),
            Some(Duration::hours(10))
        );
        assert_eq!(parse_duration_hint("too long"), None);
        assert_eq!(parse_duration_hint("1:75"), None);
    }

    #[test]
    fn short_session_boundary_is_exclusive() {
        let policy = ClientPolicy::default();
        assert!(policy.is_short_session(Duration::milliseconds(59_999)));
        assert!(!policy.is_short_session(Duration::seconds(60)));
        assert!(!policy.is_short_session(Duration::seconds(61)));
    }

    #[test]
    fn max_duration_falls_back_to_eight_hours() {
        let policy = ClientPolicy::default();
        assert_eq!(policy.max_duration_from("no hint"), Duration::hours(8));
        assert_eq!(policy.max_duration_from("limit 2:30"), Duration::minutes(150));
    }

    #[test]
    fn hours_render_like_decimals() {
        assert_eq!(format_hours(Duration::hours(8)), "8");
        assert_eq!(format_hours(Duration::minutes(150)), "2.5");
    }

    #[tokio::test]
    async fn stop_without_session_is_noop() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        assert_eq!(client.stop().await.unwrap(), None);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn short_session_is_deleted() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::seconds(10));

        assert_eq!(client.stop().await.unwrap(), Some(StopOutcome::Deleted));
        assert_eq!(api.calls(), vec![ApiCall::Delete("7".into())]);
        assert!(!client.sessions().is_open());
    }

    #[tokio::test]
    async fn long_session_is_stopped() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::minutes(5));

        assert_eq!(client.stop().await.unwrap(), Some(StopOutcome::Stopped));
        assert_eq!(api.calls(), vec![ApiCall::Stop("7".into())]);
    }

    #[tokio::test]
    async fn duration_rejection_patches_end_from_hint() {
        let api = MockApi::new();
        api.fail_stop(ApiError::DurationExceeded {
            message: "Maximum duration of 2:30 hours exceeded.".to_string(),
        });
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::hours(12));
        let started = client.sessions().current().unwrap().started_at;

        let outcome = client.stop().await.unwrap();

        assert_eq!(
            outcome,
            Some(StopOutcome::Corrected {
                duration: Duration::minutes(150)
            })
        );
        assert_eq!(
            api.calls(),
            vec![
                ApiCall::Stop("7".into()),
                ApiCall::SetEnd("7".into(), started + Duration::minutes(150)),
            ]
        );
        assert!(notifier.contains("after 2.5h"));
    }

    #[tokio::test]
    async fn duration_rejection_without_hint_uses_eight_hours() {
        let api = MockApi::new();
        api.fail_stop(ApiError::DurationExceeded {
            message: "This entry is too long.".to_string(),
        });
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::hours(30));
        let started = client.sessions().current().unwrap().started_at;

        client.stop().await.unwrap();

        assert_eq!(
            api.calls().last(),
            Some(&ApiCall::SetEnd("7".into(), started + Duration::hours(8)))
        );
    }

    #[tokio::test]
    async fn failed_correction_is_terminal_and_clears_session() {
        let api = MockApi::new();
        api.fail_stop(ApiError::DurationExceeded {
            message: "1:00".to_string(),
        });
        api.fail_set_end(ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        });
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::hours(3));

        let err = client.stop().await.unwrap_err();

        assert!(matches!(err, EntryError::Correct { .. }));
        assert_eq!(api.calls().len(), 2);
        assert!(!client.sessions().is_open());
        assert!(notifier.contains("Could not modify previous activity"));
    }

    #[tokio::test]
    async fn other_stop_failure_clears_session() {
        let api = MockApi::new();
        api.fail_stop(ApiError::Transport("connection refused".to_string()));
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::minutes(2));

        assert!(matches!(
            client.stop().await,
            Err(EntryError::Stop { .. })
        ));
        assert!(!client.sessions().is_open());
        assert!(notifier.contains("Could not stop activity"));
    }

    #[tokio::test]
    async fn failed_delete_clears_session() {
        let api = MockApi::new();
        api.fail_delete(ApiError::Transport("offline".to_string()));
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "7", Duration::seconds(5));

        assert!(matches!(
            client.stop().await,
            Err(EntryError::Delete { .. })
        ));
        assert!(!client.sessions().is_open());
    }

    #[tokio::test]
    async fn start_records_authoritative_begin() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        let session = client.start(ActivityKey::new(10, 20)).await.unwrap();

        assert_eq!(client.sessions().current(), Some(&session));
        assert_eq!(session.started_at, api.active_entry().unwrap().begin);
        assert!(matches!(
            api.calls().as_slice(),
            [ApiCall::Start(key, _), ApiCall::Active] if *key == ActivityKey::new(10, 20)
        ));
        assert!(notifier.contains("Currently tracking"));
    }

    #[tokio::test]
    async fn start_closes_previous_session_first() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "old", Duration::minutes(30));

        client.start(ActivityKey::new(1, 2)).await.unwrap();

        let calls = api.calls();
        assert_eq!(calls[0], ApiCall::Stop("old".into()));
        assert!(matches!(calls[1], ApiCall::Start(..)));
    }

    #[tokio::test]
    async fn start_retries_then_succeeds() {
        let api = MockApi::new();
        api.fail_starts(2);
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        client.start(ActivityKey::new(1, 2)).await.unwrap();

        let starts = api
            .calls()
            .iter()
            .filter(|c| matches!(c, ApiCall::Start(..)))
            .count();
        assert_eq!(starts, 3);
        assert!(client.sessions().is_open());
    }

    #[tokio::test]
    async fn start_gives_up_after_three_attempts() {
        let api = MockApi::new();
        api.fail_starts(10);
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        let err = client.start(ActivityKey::new(1, 2)).await.unwrap_err();

        assert!(matches!(err, EntryError::Start { attempts: 3, .. }));
        assert_eq!(api.calls().len(), 3);
        assert!(!client.sessions().is_open());
        assert!(notifier.contains("Could not start activity"));
    }

    #[tokio::test]
    async fn lost_start_reply_adopts_created_entry() {
        let api = MockApi::new();
        api.lose_start_replies(3);
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        let session = client.start(ActivityKey::new(1, 2)).await.unwrap();

        assert_eq!(api.mutations().len(), 1);
        assert_eq!(session.id.as_str(), "1");
        assert_eq!(client.sessions().current(), Some(&session));
        assert!(notifier.contains("Currently tracking"));
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let api = MockApi::new();
        api.fail_starts_with(5, ApiError::Transport("timed out".to_string()));
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        let err = client.start(ActivityKey::new(1, 2)).await.unwrap_err();

        assert!(matches!(err, EntryError::Start { attempts: 1, .. }));
        assert_eq!(api.mutations().len(), 1);
        assert!(!client.sessions().is_open());
        assert!(notifier.contains("Could not start activity"));
    }

    #[tokio::test]
    async fn lost_reply_for_other_activity_is_a_failure() {
        let other = ActivityKey::new(9, 9);
        let api = MockApi::new().with_active(ActiveEntry {
            id: EntryId::new("50").unwrap(),
            begin: Utc::now(),
            activity: other,
            label: label_for(other),
        });
        api.fail_starts_with(1, ApiError::InvalidResponse("empty".to_string()));
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        assert!(client.start(ActivityKey::new(1, 2)).await.is_err());
        assert!(!client.sessions().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_starts_before_third_attempt() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = TimeEntryClient::new(
            api.clone(),
            ClientPolicy {
                start_attempts: 4,
                ..ClientPolicy::default()
            },
            Arc::new(notifier.clone()),
        );

        api.fail_starts(1);
        let began = tokio::time::Instant::now();
        client.start(ActivityKey::new(1, 2)).await.unwrap();
        assert!(began.elapsed() < StdDuration::from_secs(1));

        client.sessions.take();
        api.fail_starts(10);
        let began = tokio::time::Instant::now();
        let err = client.start(ActivityKey::new(1, 2)).await.unwrap_err();
        assert!(matches!(err, EntryError::Start { attempts: 4, .. }));
        // Two pauses: before the third and the fourth attempt.
        let waited = began.elapsed();
        assert!(waited >= StdDuration::from_secs(2), "{waited:?}");
        assert!(waited < StdDuration::from_secs(3), "{waited:?}");
    }

    #[tokio::test]
    async fn start_survives_failed_confirmation() {
        let api = MockApi::new();
        api.fail_active(ApiError::Transport("timeout".to_string()));
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);

        let session = client.start(ActivityKey::new(3, 4)).await.unwrap();

        assert!(client.sessions().is_open());
        assert_eq!(session.id.as_str(), "1");
        assert!(notifier.contains("Started 3.4"));
    }

    #[tokio::test]
    async fn delete_clears_matching_session() {
        let api = MockApi::new();
        let notifier = RecordingNotifier::new();
        let mut client = client(&api, &notifier);
        open_for(&mut client, "9", Duration::hours(1));

        client.delete(&EntryId::new("9").unwrap()).await.unwrap();

        assert!(!client.sessions().is_open());
        assert_eq!(api.calls(), vec![ApiCall::Delete("9".into())]);
    }

    #[tokio::test]
    async fn fetch_active_failure_is_reported() {
        let api = MockApi::new();
        api.fail_active(ApiError::Transport("dns".to_string()));
        let notifier = RecordingNotifier::new();
        let client = client(&api, &notifier);

        assert!(matches!(
            client.fetch_active().await,
            Err(EntryError::Fetch(_))
        ));
        assert!(notifier.contains("Could not read current activity"));
    }
}
