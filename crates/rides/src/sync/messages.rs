//! Mapping of proxy failure reasons to user-facing guidance

/// Known proxy failure substrings and the guidance shown instead.
/// Checked in order; matching is case-insensitive.
const GUIDANCE: &[(&str, &str)] = &[
    (
        "missing_cg_uid_cookie",
        "You are not signed in. Sign in again and restart the import.",
    ),
    (
        "missing_server_tokens",
        "Strava is not connected for this account. Connect Strava and try again.",
    ),
    (
        "missing tokens",
        "Strava is not connected for this account. Connect Strava and try again.",
    ),
    (
        "missing_refresh_token",
        "The Strava connection has expired. Reconnect Strava and try again.",
    ),
    (
        "strava_refresh_failed",
        "The Strava connection could not be renewed. Reconnect Strava and try again.",
    ),
    (
        "strava_auth_failed",
        "Strava rejected the stored authorization. Reconnect Strava and try again.",
    ),
    (
        "missing_strava_client_env",
        "The server is missing its Strava configuration. Contact support.",
    ),
    (
        "unauthorized",
        "Your session is not authorized. Sign in again and reconnect Strava.",
    ),
];

/// Rewrite a proxy failure into a message safe to show the user
///
/// Known failure codes become actionable guidance, 401/403 without a known
/// code are treated as "unauthorized", and anything else passes through
/// verbatim. An empty message falls back to the status code.
pub fn humanize_failure(status_code: Option<u16>, message: &str) -> String {
    let trimmed = message.trim();
    let lowered = trimmed.to_lowercase();

    if let Some((_, guidance)) = GUIDANCE.iter().find(|(needle, _)| lowered.contains(needle)) {
        return (*guidance).to_string();
    }

    if matches!(status_code, Some(401) | Some(403)) {
        return humanize_failure(None, "unauthorized");
    }

    match (trimmed.is_empty(), status_code) {
        (false, _) => trimmed.to_string(),
        (true, Some(code)) => format!("Import failed (HTTP {})", code),
        (true, None) => "Import failed".to_string(),
    }
}
