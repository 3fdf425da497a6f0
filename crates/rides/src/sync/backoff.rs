//! Retry classification for page outcomes
//!
//! `decide` is a pure function: it never sleeps or touches session state,
//! so every branch can be tested without a network.

use std::time::Duration;

use super::messages::humanize_failure;
use super::outcome::SyncOutcome;

/// Wait after a network failure
pub const TRANSPORT_RETRY: Duration = Duration::from_secs(5);
/// Wait after a gateway error from the proxy
pub const GATEWAY_RETRY: Duration = Duration::from_secs(5);
/// Wait after a 2xx response that could not be parsed
pub const MALFORMED_RETRY: Duration = Duration::from_secs(3);
/// Rate-limit wait when the server does not advertise one
pub const DEFAULT_RATE_LIMIT_SECS: i64 = 15;
/// Bounds for any rate-limit wait
pub const MIN_RATE_LIMIT_SECS: i64 = 5;
pub const MAX_RATE_LIMIT_SECS: i64 = 120;

/// What the driver should do with an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Merge the batch and continue from the server's cursor
    Proceed { next_page: Option<i64> },
    /// Sleep, then request the same page again
    RetrySamePage { wait: Duration, reason: RetryReason },
    /// End the session with a user-facing message
    Abort { message: String },
}

/// Why a page is being retried, for progress messages and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    Transport,
    RateLimited,
    Gateway,
    Malformed,
}

impl RetryReason {
    pub fn describe(self) -> &'static str {
        match self {
            RetryReason::Transport => "Network problem",
            RetryReason::RateLimited => "Strava rate limit reached",
            RetryReason::Gateway => "Upstream service hiccup",
            RetryReason::Malformed => "Unexpected response",
        }
    }
}

/// Clamp an advertised rate-limit wait into the accepted range
pub fn rate_limit_wait(retry_after_seconds: Option<i64>) -> Duration {
    let secs = retry_after_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_SECS)
        .clamp(MIN_RATE_LIMIT_SECS, MAX_RATE_LIMIT_SECS);
    Duration::from_secs(secs as u64)
}

/// Classify an outcome
pub fn decide(outcome: &SyncOutcome) -> Decision {
    match outcome {
        SyncOutcome::TransportError { .. } => Decision::RetrySamePage {
            wait: TRANSPORT_RETRY,
            reason: RetryReason::Transport,
        },
        SyncOutcome::HttpError {
            status_code: 429,
            retry_after_seconds,
            ..
        } => Decision::RetrySamePage {
            wait: rate_limit_wait(*retry_after_seconds),
            reason: RetryReason::RateLimited,
        },
        SyncOutcome::Success(batch) if batch.rate_limited => Decision::RetrySamePage {
            wait: rate_limit_wait(batch.retry_after_seconds),
            reason: RetryReason::RateLimited,
        },
        SyncOutcome::HttpError {
            status_code: 502..=504,
            ..
        } => Decision::RetrySamePage {
            wait: GATEWAY_RETRY,
            reason: RetryReason::Gateway,
        },
        SyncOutcome::HttpError {
            status_code,
            message,
            ..
        } => Decision::Abort {
            message: humanize_failure(Some(*status_code), message),
        },
        SyncOutcome::Rejected { message } => Decision::Abort {
            message: humanize_failure(None, message),
        },
        SyncOutcome::MalformedResponse => Decision::RetrySamePage {
            wait: MALFORMED_RETRY,
            reason: RetryReason::Malformed,
        },
        SyncOutcome::Success(batch) => Decision::Proceed {
            next_page: batch.next_page,
        },
    }
}
