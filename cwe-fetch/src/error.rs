//! Error types for cwe-fetch

use std::error::Error as StdError;
use thiserror::Error;

/// Failure of a single HTTP call
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection refused or reset
    #[error("Connection error: {0}")]
    Transport(String),

    /// Connect or request timeout elapsed
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP 429
    #[error("Rate limit exceeded")]
    RateLimited,

    /// HTTP 5xx
    #[error("Server error {0}")]
    Server(u16),

    /// HTTP 404, with the response body
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success status
    #[error("HTTP error {status} for {url}")]
    Http { status: u16, url: String },

    /// Body was not valid JSON
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    /// Certificate verification or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    /// Classify a reqwest error
    ///
    /// reqwest does not expose TLS failures as a kind, so the source chain
    /// is inspected for certificate or handshake wording.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let chain = error_chain(&err);
        if err.is_timeout() {
            FetchError::Timeout(chain)
        } else if is_tls_message(&chain) {
            FetchError::Tls(chain)
        } else if err.is_builder() {
            FetchError::Client(chain)
        } else if err.is_decode() {
            FetchError::Malformed(chain)
        } else {
            FetchError::Transport(chain)
        }
    }

    /// Status-code based classification for non-success responses
    pub fn from_status(status: u16, url: &str, body: String) -> Self {
        match status {
            404 => FetchError::NotFound(body),
            429 => FetchError::RateLimited,
            500..=599 => FetchError::Server(status),
            _ => FetchError::Http {
                status,
                url: url.to_string(),
            },
        }
    }

    /// True when another attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(_) | FetchError::Timeout(_) | FetchError::RateLimited | FetchError::Server(_)
        )
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

fn is_tls_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["certificate", "tls", "ssl", "handshake"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// Failure of a whole collection run
#[derive(Debug, Error)]
pub enum CollectError {
    /// Neither the primary API nor the fallback snapshot is reachable
    #[error("CWE API unavailable and fallback snapshot failed: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Result type for single calls
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for collection runs
pub type CollectResult<T> = Result<T, CollectError>;
