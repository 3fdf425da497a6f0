//! Typed result of a single proxy call

use serde::{Deserialize, Serialize};

/// Diagnostic record for a ride the proxy failed to import
///
/// Kept verbatim as the proxy sent it; the accessors only read the fields
/// the proxy commonly uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorRecord(pub serde_json::Value);

impl ErrorRecord {
    /// Ride id the record refers to, if present
    pub fn ride_id(&self) -> Option<String> {
        ["rid", "id", "activity_id"]
            .iter()
            .find_map(|key| match self.0.get(key)? {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }

    /// Human-readable failure reason, if present
    pub fn reason(&self) -> Option<&str> {
        ["error", "reason", "detail", "message"]
            .iter()
            .find_map(|key| self.0.get(key)?.as_str())
    }
}

/// A successfully parsed page of import results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportBatch {
    /// Ride ids the proxy imported for this page (may overlap other pages)
    pub imported_ids: Vec<String>,
    /// Count the proxy reported, which can differ from `imported_ids.len()`
    pub imported_count: usize,
    pub error_records: Vec<ErrorRecord>,
    /// Server-supplied continuation cursor
    pub next_page: Option<i64>,
    pub done: bool,
    /// Soft rate limit: the page must be retried after a pause
    pub rate_limited: bool,
    pub retry_after_seconds: Option<i64>,
}

/// Everything a page fetch can produce
///
/// Cancellation is reported separately through
/// [`Cancelled`](super::Cancelled) so it is never mistaken for a
/// retryable failure.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Success(ImportBatch),
    /// Non-2xx status with the best reason that could be extracted
    HttpError {
        status_code: u16,
        message: String,
        retry_after_seconds: Option<i64>,
    },
    /// No response: connect, DNS, I/O or timeout failure
    TransportError { message: String },
    /// 2xx status but the body was missing or did not match the contract
    MalformedResponse,
    /// 2xx body with `ok: false` that is not a rate limit
    Rejected { message: String },
}

impl SyncOutcome {
    /// Short label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            SyncOutcome::Success(b) if b.rate_limited => "rate-limited",
            SyncOutcome::Success(_) => "success",
            SyncOutcome::HttpError { .. } => "http-error",
            SyncOutcome::TransportError { .. } => "transport-error",
            SyncOutcome::MalformedResponse => "malformed-response",
            SyncOutcome::Rejected { .. } => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_record_accessors() {
        let record = ErrorRecord(json!({"rid": 123456, "error": "streams_unavailable"}));
        assert_eq!(record.ride_id().as_deref(), Some("123456"));
        assert_eq!(record.reason(), Some("streams_unavailable"));
    }

    #[test]
    fn test_error_record_without_fields() {
        let record = ErrorRecord(json!("boom"));
        assert_eq!(record.ride_id(), None);
        assert_eq!(record.reason(), None);
    }

    #[test]
    fn test_outcome_kind() {
        let soft = SyncOutcome::Success(ImportBatch {
            rate_limited: true,
            ..ImportBatch::default()
        });
        assert_eq!(soft.kind(), "rate-limited");
        assert_eq!(SyncOutcome::MalformedResponse.kind(), "malformed-response");
    }
}
