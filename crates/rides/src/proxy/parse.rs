//! Strict conversion of proxy responses into outcomes

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::api::{ImportedField, SyncResponse};
use crate::sync::{ErrorRecord, ImportBatch, SyncOutcome};

/// Fields probed, in order, for a human-readable failure reason
const REASON_KEYS: [&str; 4] = ["detail", "error", "reason", "message"];

/// Longest plain-text error body passed through as a message
const MAX_TEXT_REASON: usize = 300;

/// Classify a proxy response
///
/// 2xx bodies must match the sync contract: a rate-limit signal, an explicit
/// `ok: false`, or a result carrying both ride ids and `done`. Anything else
/// is `MalformedResponse` rather than a guessed default. For other statuses
/// the best available reason is extracted from the body, falling back to
/// the status line.
pub fn outcome_from_response(
    status: u16,
    status_text: Option<&str>,
    body: &str,
    retry_after_header: Option<i64>,
) -> SyncOutcome {
    if (200..300).contains(&status) {
        return match serde_json::from_str::<SyncResponse>(body) {
            Ok(parsed) => success_outcome(parsed, retry_after_header),
            Err(_) => SyncOutcome::MalformedResponse,
        };
    }

    let retry_after_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("retry_after_s").and_then(Value::as_f64))
        .map(seconds_from_f64);

    let message = error_message(body).unwrap_or_else(|| match status_text {
        Some(text) => format!("HTTP {} {}", status, text),
        None => format!("HTTP {}", status),
    });

    SyncOutcome::HttpError {
        status_code: status,
        message,
        retry_after_seconds: retry_after_body.or(retry_after_header),
    }
}

fn success_outcome(parsed: SyncResponse, retry_after_header: Option<i64>) -> SyncOutcome {
    let retry_after_seconds = parsed.retry_after_s.map(seconds_from_f64).or(retry_after_header);

    if parsed.ok == Some(false) && !parsed.rate_limited {
        let message = [&parsed.detail, &parsed.error, &parsed.reason, &parsed.message]
            .into_iter()
            .flatten()
            .find_map(reason_text)
            .unwrap_or_else(|| "The import service reported a failure".to_string());
        return SyncOutcome::Rejected { message };
    }

    let (listed, listed_count) = match parsed.imported {
        Some(ImportedField::Ids(ids)) => (Some(ids), None),
        Some(ImportedField::Count(n)) => (None, Some(n)),
        None => (None, None),
    };
    let ids = parsed.imported_ids.or(listed);

    let error_records: Vec<ErrorRecord> = parsed
        .errors
        .unwrap_or_default()
        .into_iter()
        .map(ErrorRecord)
        .collect();

    if parsed.rate_limited {
        let imported_ids: Vec<String> = ids
            .unwrap_or_default()
            .into_iter()
            .map(|id| id.into_string())
            .collect();
        return SyncOutcome::Success(ImportBatch {
            imported_count: parsed.imported_count.or(listed_count).unwrap_or(imported_ids.len()),
            imported_ids,
            error_records,
            next_page: parsed.next_page,
            done: parsed.done.unwrap_or(false),
            rate_limited: true,
            retry_after_seconds,
        });
    }

    let (Some(ids), Some(done)) = (ids, parsed.done) else {
        return SyncOutcome::MalformedResponse;
    };
    let imported_ids: Vec<String> = ids.into_iter().map(|id| id.into_string()).collect();

    SyncOutcome::Success(ImportBatch {
        imported_count: parsed.imported_count.or(listed_count).unwrap_or(imported_ids.len()),
        imported_ids,
        error_records,
        next_page: parsed.next_page,
        done,
        rate_limited: false,
        retry_after_seconds,
    })
}

/// Extract a failure reason from an error body
///
/// JSON bodies are searched for `detail`, `error`, `reason` and `message`
/// (nested one level, and FastAPI-style validation lists). Non-JSON bodies
/// are used as plain text when short and not HTML.
pub fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => REASON_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(reason_text),
        Ok(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => None,
        Err(_) if trimmed.starts_with('<') => None,
        Err(_) => Some(trimmed.chars().take(MAX_TEXT_REASON).collect()),
    }
}

fn reason_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => REASON_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find_map(|nested| nested.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").or_else(|| item.get("message")))
                .filter_map(Value::as_str)
                .collect();
            if parts.is_empty() { None } else { Some(parts.join("; ")) }
        }
        _ => None,
    }
}

fn seconds_from_f64(secs: f64) -> i64 {
    // `as` saturates, and maps NaN to 0
    secs.ceil() as i64
}

/// Parse a `Retry-After` header value into seconds from `now`
///
/// Accepts delta-seconds and HTTP-date forms. Dates in the past give 0.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<i64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<i64>() {
        return Some(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).num_seconds().max(0))
}
