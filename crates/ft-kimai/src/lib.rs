//! Kimai timesheet API client.
//!
//! Implements [`ft_core::TimesheetApi`] over the Kimai REST API:
//! - `GET  /api/timesheets/active`
//! - `POST /api/timesheets`
//! - `GET  /api/timesheets/{id}/stop`
//! - `DELETE /api/timesheets/{id}`
//! - `PATCH /api/timesheets/{id}`
//!
//! Every request carries the bearer token and is bounded by the client's
//! request timeout.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use ft_core::{ActiveEntry, ActivityKey, ApiError, CreatedEntry, EntryId, TimesheetApi};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default request timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timestamp format Kimai expects in request bodies (local time, no offset).
const WIRE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// JSON pointer to the validation messages of a rejected duration.
const DURATION_ERRORS_POINTER: &str = "/errors/children/duration/errors";

/// Client construction errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The provided API token was invalid.
    #[error("invalid API token: {reason}")]
    InvalidToken { reason: &'static str },
    /// The configured host is not an http(s) URL.
    #[error("invalid API host {host:?}: expected an http:// or https:// URL")]
    InvalidHost { host: String },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Kimai API client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct KimaiClient {
    http: reqwest::Client,
    host: String,
    token: String,
}

impl fmt::Debug for KimaiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KimaiClient")
            .field("host", &self.host)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl KimaiClient {
    /// Creates a new client for `host` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is blank, the host is not an http(s)
    /// URL, or the HTTP client fails to build.
    pub fn new(
        host: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ClientError::InvalidToken {
                reason: "API token cannot be empty",
            });
        }
        if token.trim().is_empty() {
            return Err(ClientError::InvalidToken {
                reason: "API token cannot be whitespace-only",
            });
        }

        let host = host.into().trim().trim_end_matches('/').to_string();
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            return Err(ClientError::InvalidHost { host });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::ClientBuild)?;

        Ok(Self { http, host, token })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.host)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        tracing::debug!(%method, path, "kimai request");
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends `request` and returns the body of a successful response.
    async fn send(request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl TimesheetApi for KimaiClient {
    async fn active(&self) -> Result<Option<ActiveEntry>, ApiError> {
        let body = Self::send(self.request(Method::GET, "timesheets/active")).await?;
        parse_active(&body)
    }

    async fn start(
        &self,
        key: ActivityKey,
        begin: DateTime<Utc>,
    ) -> Result<CreatedEntry, ApiError> {
        let payload = NewTimesheet {
            begin: format_wire_time(begin),
            project: key.project,
            activity: key.activity,
        };
        let body = Self::send(self.request(Method::POST, "timesheets").json(&payload)).await?;
        parse_created(&body)
    }

    async fn stop(&self, id: &EntryId) -> Result<(), ApiError> {
        Self::send(self.request(Method::GET, &format!("timesheets/{id}/stop")))
            .await
            .map(drop)
            .map_err(classify_stop_error)
    }

    async fn delete(&self, id: &EntryId) -> Result<(), ApiError> {
        Self::send(self.request(Method::DELETE, &format!("timesheets/{id}")))
            .await
            .map(drop)
    }

    async fn set_end(&self, id: &EntryId, end: DateTime<Utc>) -> Result<(), ApiError> {
        let payload = EndPatch {
            end: format_wire_time(end),
        };
        Self::send(
            self.request(Method::PATCH, &format!("timesheets/{id}"))
                .json(&payload),
        )
        .await
        .map(drop)
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

#[derive(Debug, Serialize)]
struct NewTimesheet {
    begin: String,
    project: u64,
    activity: u64,
}

#[derive(Debug, Serialize)]
struct EndPatch {
    end: String,
}

#[derive(Debug, Deserialize)]
struct ActiveTimesheet {
    id: u64,
    begin: String,
    project: Project,
    activity: Activity,
}

#[derive(Debug, Deserialize)]
struct Project {
    id: u64,
    name: String,
    customer: Customer,
}

#[derive(Debug, Deserialize)]
struct Customer {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Activity {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTimesheet {
    id: u64,
    begin: String,
}

fn entry_id(id: u64) -> Result<EntryId, ApiError> {
    EntryId::new(id.to_string()).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}

/// Parses the active-timesheets listing; only the first entry matters.
fn parse_active(body: &str) -> Result<Option<ActiveEntry>, ApiError> {
    let entries: Vec<ActiveTimesheet> =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    let Some(first) = entries.into_iter().next() else {
        return Ok(None);
    };
    Ok(Some(ActiveEntry {
        id: entry_id(first.id)?,
        begin: parse_wire_time(&first.begin)?,
        activity: ActivityKey::new(first.project.id, first.activity.id),
        label: format!(
            "{}: {} ({})",
            first.project.customer.name, first.project.name, first.activity.name
        ),
    }))
}

fn parse_created(body: &str) -> Result<CreatedEntry, ApiError> {
    let created: CreatedTimesheet =
        serde_json::from_str(body).map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
    Ok(CreatedEntry {
        id: entry_id(created.id)?,
        begin: parse_wire_time(&created.begin)?,
    })
}

/// Turns a duration validation failure into [`ApiError::DurationExceeded`].
///
/// Kimai reports it as a form error under `errors.children.duration.errors`.
fn classify_stop_error(err: ApiError) -> ApiError {
    let ApiError::Status { status, body } = err else {
        return err;
    };
    if status != StatusCode::BAD_REQUEST.as_u16() {
        return ApiError::Status { status, body };
    }
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(&body) else {
        return ApiError::Status { status, body };
    };
    match payload.pointer(DURATION_ERRORS_POINTER) {
        Some(errors) => ApiError::DurationExceeded {
            message: errors
                .get(0)
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        None => ApiError::Status { status, body },
    }
}

/// Formats `time` as local wall-clock time with seconds precision.
pub fn format_wire_time(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format(WIRE_TIME_FORMAT)
        .to_string()
}

/// Parses a Kimai timestamp: RFC 3339, ISO-8601 with a `+hhmm` offset, or a
/// bare local time.
pub fn parse_wire_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }
    if let Ok(time) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, WIRE_TIME_FORMAT)
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .map(|time| time.with_timezone(&Utc))
        .ok_or_else(|| ApiError::InvalidResponse(format!("unparseable timestamp {raw:?}")))
}
