use std::time::Duration;

use thiserror::Error;

/// Substrings that identify a provider rate-limit failure in an error message.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "resource_exhausted",
];

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("generation cancelled")]
    Cancelled,

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Build an error from a failure message, recognising rate limits.
    pub fn from_message(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        if is_rate_limit_message(&msg) {
            AgentError::RateLimited(msg)
        } else {
            AgentError::Process(msg)
        }
    }

    /// True for [`AgentError::RateLimited`] and for any other variant whose
    /// message carries a rate-limit marker.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            AgentError::RateLimited(_) => true,
            AgentError::Timeout(_) | AgentError::Cancelled => false,
            other => is_rate_limit_message(&other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if status.as_u16() == 429 => AgentError::RateLimited(e.to_string()),
            _ => AgentError::Http(e.to_string()),
        }
    }
}

pub fn is_rate_limit_message(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m))
}
