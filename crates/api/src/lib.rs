//! Jenkins HTTP session management.
//!
//! This crate owns the one authenticated connection per server that the rest
//! of the workspace talks through:
//!
//! - Basic auth (user + API token) on every request
//! - A lazily fetched, cached crumb (CSRF token) attached to mutating
//!   requests, refreshed once and retried once when the server rejects it
//! - Bounded exponential backoff for read requests; mutating requests are
//!   never transport-retried beyond the crumb refresh, so a flaky network
//!   cannot queue duplicate builds
//! - Per-segment percent-encoding of job paths
//!
//! The primary entry point is [`JenkinsClient`]. Construct one per
//! [`ServerConfig`] and share it (it is internally synchronized) across
//! concurrent operations against that server.

use std::time::{Duration, Instant};

use jenky_types::{Error, Result, ServerConfig};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, header};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Per-request deadline; there is no server-wide operation timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Total attempts for read requests, including the first.
const READ_ATTEMPTS: u32 = 3;
/// Base delay for read retries; doubles per attempt.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
/// Longest response-body excerpt embedded in error messages.
const ERROR_EXCERPT_LEN: usize = 200;

/// Bytes percent-encoded inside a single path segment. `/` is included so a
/// segment can never smuggle in a path separator.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'[')
    .add(b']')
    .add(b'/')
    .add(b'%');

/// Render a slash-delimited job name as a Jenkins URL path.
///
/// Each component becomes a `/job/<component>` hop and is percent-encoded on
/// its own, never the path as a whole:
///
/// ```
/// assert_eq!(jenky_api::job_path("release/deploy app"), "/job/release/job/deploy%20app");
/// ```
pub fn job_path(full_name: &str) -> String {
    let mut path = String::new();
    for part in full_name.split('/').filter(|part| !part.is_empty()) {
        path.push_str("/job/");
        path.push_str(&utf8_percent_encode(part, SEGMENT).to_string());
    }
    path
}

/// Crumb issued by the server's crumb issuer endpoint.
#[derive(Debug, Clone)]
struct Crumb {
    /// Header name the crumb must be sent under (e.g. `Jenkins-Crumb`).
    field: String,
    value: String,
    acquired_at: Instant,
}

impl PartialEq for Crumb {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.value == other.value
    }
}

/// Cached crumb state for one server.
#[derive(Debug)]
enum CrumbState {
    /// Not fetched yet; resolved on the first mutating call.
    Unknown,
    /// The issuer endpoint does not exist; CSRF protection is off.
    Disabled,
    Issued(Crumb),
}

/// Outcome of a mutating request with the body already drained, so callers
/// can branch on status and body without touching the transport again.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// `Location` header, carrying the queue reference after a trigger.
    pub location: Option<String>,
    pub body: String,
}

/// One authenticated session against a single Jenkins server.
///
/// The crumb cache is the only mutable state and is guarded by a mutex so
/// concurrent mutating calls never both observe a stale crumb and both
/// refresh it redundantly. The lock is never held across the mutating
/// request itself, only across the read-check-refresh sequence.
#[derive(Debug)]
pub struct JenkinsClient {
    server: ServerConfig,
    http: Client,
    crumb: Mutex<CrumbState>,
}

impl JenkinsClient {
    /// Build a client for a resolved server configuration.
    pub fn new(server: ServerConfig) -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| Error::config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self {
            server,
            http,
            crumb: Mutex::new(CrumbState::Unknown),
        })
    }

    /// Name of the server this session talks to.
    pub fn server_name(&self) -> &str {
        &self.server.name
    }

    /// Configured user identity for this server.
    pub fn user(&self) -> &str {
        &self.server.user
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.server.base_url()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.server.base_url(), path);
        self.http
            .request(method, url)
            .basic_auth(&self.server.user, Some(&self.server.token))
    }

    /// Issue a read request, retrying transient transport failures with
    /// bounded exponential backoff.
    pub async fn get(&self, path: &str) -> Result<Response> {
        let mut attempt = 1;
        loop {
            match self.request(Method::GET, path).send().await {
                Ok(response) => {
                    debug!(server = %self.server.name, %path, status = %response.status(), "GET");
                    return Ok(response);
                }
                Err(error) if attempt < READ_ATTEMPTS && is_transient(&error) => {
                    warn!(server = %self.server.name, %path, attempt, error = %error, "read failed, retrying");
                    tokio::time::sleep(BACKOFF_BASE * 2u32.pow(attempt - 1)).await;
                    attempt += 1;
                }
                Err(error) => return Err(self.network_error(attempt, &error)),
            }
        }
    }

    /// Read a JSON endpoint.
    ///
    /// Returns the status alongside the parsed body so callers can map a 404
    /// to their own not-found error; the body is `Null` in that case. A 401
    /// surfaces as [`Error::Auth`], a 403 as [`Error::Permission`], and any
    /// other non-success status as [`Error::Remote`].
    pub async fn get_json(&self, path: &str) -> Result<(StatusCode, Value)> {
        let response = self.get(path).await?;
        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => Ok((status, Value::Null)),
            StatusCode::UNAUTHORIZED => Err(Error::auth(&self.server.name, "credentials rejected")),
            StatusCode::FORBIDDEN => Err(Error::permission("read", path.to_string())),
            status if status.is_success() => {
                let value = response
                    .json()
                    .await
                    .map_err(|error| Error::remote(&self.server.name, status.as_u16(), format!("invalid JSON body: {error}")))?;
                Ok((status, value))
            }
            status => Err(self.remote_error(status, response).await),
        }
    }

    /// Issue a mutating request with the crumb protocol applied.
    ///
    /// The current crumb is attached (fetching it first if none is cached).
    /// If the server answers 403 with a crumb-rejection signal, the crumb is
    /// invalidated, re-fetched once, and the request retried exactly once; a
    /// second rejection is an [`Error::Auth`]. A 403 without the crumb
    /// signal is returned to the caller untouched, because it is an
    /// operation-level permission answer, not a session problem.
    pub async fn post(&self, path: &str, query: &[(String, String)], xml_body: Option<&str>) -> Result<ApiResponse> {
        let crumb = self.current_crumb().await?;
        let response = self.send_post(path, query, xml_body, crumb.as_ref()).await?;
        if !is_crumb_rejection(&response) {
            return Ok(response);
        }

        let refreshed = self.refresh_crumb(crumb.as_ref()).await?;
        let retried = self.send_post(path, query, xml_body, refreshed.as_ref()).await?;
        if is_crumb_rejection(&retried) {
            return Err(Error::auth(
                &self.server.name,
                "security token rejected twice; check the configured user and API token",
            ));
        }
        Ok(retried)
    }

    async fn send_post(
        &self,
        path: &str,
        query: &[(String, String)],
        xml_body: Option<&str>,
        crumb: Option<&Crumb>,
    ) -> Result<ApiResponse> {
        let mut builder = self.request(Method::POST, path);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(xml) = xml_body {
            builder = builder
                .header(header::CONTENT_TYPE, "application/xml")
                .body(xml.to_string());
        }
        if let Some(crumb) = crumb {
            builder = builder.header(crumb.field.as_str(), crumb.value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| self.network_error(1, &error))?;
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();
        debug!(server = %self.server.name, %path, status = %status, "POST");
        Ok(ApiResponse { status, location, body })
    }

    /// Current crumb, fetching and caching it on first use.
    async fn current_crumb(&self) -> Result<Option<Crumb>> {
        let mut state = self.crumb.lock().await;
        match &*state {
            CrumbState::Issued(crumb) => Ok(Some(crumb.clone())),
            CrumbState::Disabled => Ok(None),
            CrumbState::Unknown => {
                let fetched = self.fetch_crumb().await?;
                *state = match &fetched {
                    Some(crumb) => CrumbState::Issued(crumb.clone()),
                    None => CrumbState::Disabled,
                };
                Ok(fetched)
            }
        }
    }

    /// Replace a stale crumb.
    ///
    /// If another caller already refreshed the cache since `stale` was read,
    /// the newer crumb is reused without hitting the issuer again.
    async fn refresh_crumb(&self, stale: Option<&Crumb>) -> Result<Option<Crumb>> {
        let mut state = self.crumb.lock().await;
        if let CrumbState::Issued(current) = &*state
            && stale != Some(current)
        {
            return Ok(Some(current.clone()));
        }
        if let Some(stale) = stale {
            debug!(server = %self.server.name, age_ms = stale.acquired_at.elapsed().as_millis(), "refreshing rejected crumb");
        }

        let fetched = self.fetch_crumb().await?;
        *state = match &fetched {
            Some(crumb) => CrumbState::Issued(crumb.clone()),
            None => CrumbState::Disabled,
        };
        Ok(fetched)
    }

    async fn fetch_crumb(&self) -> Result<Option<Crumb>> {
        let response = self
            .request(Method::GET, "/crumbIssuer/api/json")
            .send()
            .await
            .map_err(|error| self.network_error(1, &error))?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(server = %self.server.name, "no crumb issuer; CSRF protection is disabled");
                Ok(None)
            }
            StatusCode::UNAUTHORIZED => Err(Error::auth(&self.server.name, "credentials rejected by crumb issuer")),
            status if status.is_success() => {
                let value: Value = response.json().await.map_err(|error| {
                    Error::remote(&self.server.name, status.as_u16(), format!("invalid crumb payload: {error}"))
                })?;
                let crumb = parse_crumb(&value).ok_or_else(|| {
                    Error::remote(&self.server.name, status.as_u16(), "crumb payload missing crumb fields")
                })?;
                debug!(server = %self.server.name, field = %crumb.field, "crumb issued");
                Ok(Some(crumb))
            }
            status => Err(self.remote_error(status, response).await),
        }
    }

    fn network_error(&self, attempts: u32, error: &reqwest::Error) -> Error {
        Error::Network {
            server: self.server.name.clone(),
            attempts,
            detail: error.to_string(),
        }
    }

    async fn remote_error(&self, status: StatusCode, response: Response) -> Error {
        let body = response.text().await.unwrap_or_default();
        Error::remote(&self.server.name, status.as_u16(), excerpt(&body))
    }
}

/// Whether a transport error is worth retrying on a read.
fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout()
}

/// A 403 whose body names the crumb is a session problem; any other 403 is
/// an operation-level permission answer.
fn is_crumb_rejection(response: &ApiResponse) -> bool {
    response.status == StatusCode::FORBIDDEN && response.body.to_ascii_lowercase().contains("crumb")
}

fn parse_crumb(value: &Value) -> Option<Crumb> {
    let field = value.get("crumbRequestField")?.as_str()?;
    let crumb = value.get("crumb")?.as_str()?;
    Some(Crumb {
        field: field.to_string(),
        value: crumb.to_string(),
        acquired_at: Instant::now(),
    })
}

/// Trim a response body down to something that fits in an error message.
fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= ERROR_EXCERPT_LEN {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(ERROR_EXCERPT_LEN).collect();
    format!("{}...", truncated.trim_end())
}
