//! Save Page Now (SPN2) submission and pacing.
//!
//! This crate provides:
//! - [`ArchiveSubmitter`] — one-shot capture requests, classified into a [`SubmitOutcome`]
//! - [`pacer`] — interval pacing over an injectable [`Clock`]

pub mod pacer;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use sitearchiver_shared::{Credentials, PageUrl, Result, SiteArchiverError, SubmitConfig};

pub use pacer::{Clock, ManualClock, Pacer, TokioClock, check_interval};

/// User-Agent string for archive requests.
const USER_AGENT: &str = concat!("sitearchiver/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// SubmitOutcome
// ---------------------------------------------------------------------------

/// Result of a single capture request. Every variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// HTTP 200 with a JSON body; the service accepted or answered the request.
    Success {
        /// Page the service reports it is capturing.
        archived_url: Option<String>,
        /// Capture job identifier.
        job_id: Option<String>,
        /// Human-readable note from the service (quota, already archived, ...).
        message: Option<String>,
    },
    /// Any status other than 200. The body is kept verbatim.
    Rejected { status: u16, body: String },
    /// Connection, timeout, body read, or JSON decode failure.
    TransportFailure { detail: String },
}

impl SubmitOutcome {
    /// Whether the request was accepted.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Fields of the SPN2 capture response we use.
///
/// Values are kept loosely typed; any JSON object on a 200 is a success.
#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    url: Option<Value>,
    #[serde(default)]
    job_id: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

/// Render a response field for logging. Strings are taken as-is, `null` is absent.
fn field_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ArchiveSubmitter
// ---------------------------------------------------------------------------

/// Sends capture requests to the Save Page Now endpoint.
///
/// Does no throttling of its own; callers pace requests with a [`Pacer`].
pub struct ArchiveSubmitter {
    client: Client,
    endpoint: Url,
    authorization: String,
    delay_wb_availability: bool,
    skip_first_archive: bool,
    if_not_archived_within: String,
}

impl ArchiveSubmitter {
    /// Create a submitter. Credentials are captured once and never re-read.
    pub fn new(config: &SubmitConfig, credentials: &Credentials) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            SiteArchiverError::config(format!(
                "invalid archive endpoint '{}': {e}",
                config.endpoint
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                SiteArchiverError::Network(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            endpoint,
            authorization: credentials.authorization(),
            delay_wb_availability: config.delay_wb_availability,
            skip_first_archive: config.skip_first_archive,
            if_not_archived_within: config.if_not_archived_within.clone(),
        })
    }

    /// Endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Submit one page for capture. Never fails; see [`SubmitOutcome`].
    #[instrument(skip_all, fields(url = %url))]
    pub async fn submit(&self, url: &PageUrl) -> SubmitOutcome {
        debug!(endpoint = %self.endpoint, "submitting capture request");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, &self.authorization)
            .form(&self.form_fields(url))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return SubmitOutcome::TransportFailure {
                    detail: error_chain(&e),
                };
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return match response.text().await {
                Ok(body) => SubmitOutcome::Rejected {
                    status: status.as_u16(),
                    body,
                },
                Err(e) => SubmitOutcome::TransportFailure {
                    detail: error_chain(&e),
                },
            };
        }

        match response.json::<SaveResponse>().await {
            Ok(data) => SubmitOutcome::Success {
                archived_url: field_text(data.url),
                job_id: field_text(data.job_id),
                message: field_text(data.message).filter(|m| !m.is_empty()),
            },
            Err(e) => SubmitOutcome::TransportFailure {
                detail: error_chain(&e),
            },
        }
    }

    /// Form body for one capture request.
    fn form_fields(&self, url: &PageUrl) -> Vec<(&'static str, String)> {
        let mut fields = vec![("url", url.as_str().to_string())];
        if self.delay_wb_availability {
            fields.push(("delay_wb_availability", "1".into()));
        }
        if self.skip_first_archive {
            fields.push(("skip_first_archive", "1".into()));
        }
        if !self.if_not_archived_within.is_empty() {
            fields.push(("if_not_archived_within", self.if_not_archived_within.clone()));
        }
        fields
    }
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}
