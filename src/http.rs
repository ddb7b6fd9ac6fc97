//! Shared HTTP plumbing for the embedding and generation clients.
//!
//! Every upstream call goes through a `ureq` agent with a global timeout, so a
//! slow service surfaces as [`UpstreamError::Timeout`] instead of hanging.
//! Requests are never retried here.

use std::io::ErrorKind as IoErrorKind;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::DocQueryError;

/// Longest error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl UpstreamError {
    /// Map onto the pipeline taxonomy; non-timeout failures become `otherwise`
    #[inline]
    pub fn into_pipeline_error(
        self,
        operation: &str,
        otherwise: fn(String) -> DocQueryError,
    ) -> DocQueryError {
        match self {
            Self::Timeout => DocQueryError::UpstreamTimeout {
                operation: operation.to_string(),
            },
            other => otherwise(format!("{operation} failed: {other}")),
        }
    }
}

impl From<ureq::Error> for UpstreamError {
    fn from(error: ureq::Error) -> Self {
        match error {
            ureq::Error::Timeout(_) => Self::Timeout,
            ureq::Error::Io(io) if io.kind() == IoErrorKind::TimedOut => Self::Timeout,
            ureq::Error::StatusCode(status) => Self::Status {
                status,
                body: String::new(),
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Build an agent whose every request is bounded by `timeout`
#[inline]
pub fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// POST a JSON body and return the response body of a 2xx reply
#[inline]
pub fn post_json(
    agent: &ureq::Agent,
    url: &Url,
    api_key: Option<&str>,
    body: &str,
) -> Result<String, UpstreamError> {
    debug!("POST {} ({} bytes)", url, body.len());

    let mut request = agent
        .post(url.as_str())
        .header("Content-Type", "application/json");
    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    let mut response = request.send(body)?;
    let status = response.status().as_u16();
    let text = response.body_mut().read_to_string()?;

    if !(200..300).contains(&status) {
        warn!("Upstream {} answered HTTP {}", url, status);
        return Err(UpstreamError::Status {
            status,
            body: truncate_body(&text),
        });
    }

    Ok(text)
}

/// Check whether a service answers at `url`.
///
/// Any HTTP reply below 500 counts as reachable; auth failures still prove
/// the host is up.
#[inline]
pub fn probe(agent: &ureq::Agent, url: &Url, api_key: Option<&str>) -> bool {
    let mut request = agent.get(url.as_str());
    if let Some(key) = api_key {
        request = request.header("Authorization", format!("Bearer {key}"));
    }

    match request.call() {
        Ok(response) => response.status().as_u16() < 500,
        Err(e) => {
            debug!("Probe of {} failed: {}", url, e);
            false
        }
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push('…');
    truncated
}
