//! Retry ladders
//!
//! Two layers compose around every uncached request:
//!
//! - **Transport layer**: retries HTTP 429/500/502/503/504 and connection
//!   resets up to `transport_attempts` times with `base × 2^n` backoff
//!   (capped). After the last attempt the response is handed up as-is.
//! - **Application layer**: `max_retries + 1` attempts driven by
//!   [`RetryPolicy::decide`]. Connection errors back off `3 × 2^attempt`
//!   seconds and recreate the HTTP client, timeouts back off
//!   `2 × 2^attempt` seconds, HTTP 429 waits a fixed 60 seconds.
//!
//! Everything else (TLS, 404, other statuses, malformed JSON) is dropped
//! on the first occurrence.

use crate::error::FetchError;
use std::time::Duration;

/// HTTP statuses retried by the transport layer
pub const TRANSPORT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry timing
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Application-layer retries after the first attempt
    pub max_retries: u32,
    pub connection_base: Duration,
    pub timeout_base: Duration,
    pub rate_limit_wait: Duration,
    /// Total transport-layer attempts per application attempt
    pub transport_attempts: u32,
    pub transport_base: Duration,
    pub transport_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            connection_base: Duration::from_secs(3),
            timeout_base: Duration::from_secs(2),
            rate_limit_wait: Duration::from_secs(60),
            transport_attempts: 8,
            transport_base: Duration::from_secs(3),
            transport_cap: Duration::from_secs(120),
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { wait: Duration, recreate_client: bool },
    GiveUp,
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Application-layer decision for a failed `attempt` (0-based)
    pub fn decide(&self, attempt: u32, failure: &FetchError) -> Decision {
        if attempt >= self.max_retries {
            return Decision::GiveUp;
        }
        match failure {
            FetchError::Transport(_) => Decision::Retry {
                wait: exponential(self.connection_base, attempt),
                recreate_client: true,
            },
            FetchError::Timeout(_) => Decision::Retry {
                wait: exponential(self.timeout_base, attempt),
                recreate_client: false,
            },
            FetchError::RateLimited => Decision::Retry {
                wait: self.rate_limit_wait,
                recreate_client: false,
            },
            _ => Decision::GiveUp,
        }
    }

    /// Transport-layer backoff before retry `n` (0-based)
    pub fn transport_backoff(&self, n: u32) -> Duration {
        exponential(self.transport_base, n).min(self.transport_cap)
    }

    /// True when the transport layer should retry this status
    pub fn transport_retries_status(&self, status: u16) -> bool {
        TRANSPORT_RETRY_STATUSES.contains(&status)
    }
}

fn exponential(base: Duration, exponent: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(exponent))
}

/// Lifecycle of one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Attempting,
    Retrying(u32),
    Succeeded,
    Dropped,
}

impl CallState {
    /// Attempt number (0-based) of the attempt about to run
    pub fn attempt(&self) -> u32 {
        match self {
            CallState::Retrying(n) => *n,
            _ => 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Succeeded | CallState::Dropped)
    }

    /// Transition after a failed attempt
    pub fn after_failure(self, decision: Decision) -> CallState {
        match (self, decision) {
            (CallState::Attempting | CallState::Retrying(_), Decision::Retry { .. }) => {
                CallState::Retrying(self.attempt() + 1)
            }
            (CallState::Attempting | CallState::Retrying(_), Decision::GiveUp) => CallState::Dropped,
            (terminal, _) => terminal,
        }
    }

    /// Transition after a successful attempt
    pub fn after_success(self) -> CallState {
        if self.is_terminal() {
            self
        } else {
            CallState::Succeeded
        }
    }
}
