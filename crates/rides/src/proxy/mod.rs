//! Sync proxy integration
//!
//! This module provides:
//! - Wire types for the proxy's `/sync` responses
//! - Strict conversion of responses into [`SyncOutcome`](crate::sync::SyncOutcome)
//! - A blocking HTTP page fetcher with cancellable waits

mod client;
mod parse;

pub use client::ProxyClient;
pub use parse::{error_message, outcome_from_response, parse_retry_after};

/// Proxy response types
pub mod api {
    use serde::Deserialize;

    /// Body of a `/sync` response
    ///
    /// Every field is optional at the serde level; [`outcome_from_response`](super::outcome_from_response)
    /// decides which ones are actually required.
    #[derive(Debug, Deserialize)]
    pub struct SyncResponse {
        pub ok: Option<bool>,
        /// Either the imported ride ids or just their count
        pub imported: Option<ImportedField>,
        pub imported_ids: Option<Vec<RideId>>,
        pub imported_count: Option<usize>,
        #[serde(alias = "error_records")]
        pub errors: Option<Vec<serde_json::Value>>,
        pub next_page: Option<i64>,
        pub done: Option<bool>,
        #[serde(default)]
        pub rate_limited: bool,
        pub retry_after_s: Option<f64>,
        pub detail: Option<serde_json::Value>,
        pub error: Option<serde_json::Value>,
        pub reason: Option<serde_json::Value>,
        pub message: Option<serde_json::Value>,
    }

    /// `imported` is sent as an id list by current proxies, as a count by older ones
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum ImportedField {
        Ids(Vec<RideId>),
        Count(usize),
    }

    /// Strava activity ids arrive as strings or numbers
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum RideId {
        Text(String),
        Number(i64),
    }

    impl RideId {
        pub fn into_string(self) -> String {
            match self {
                RideId::Text(s) => s,
                RideId::Number(n) => n.to_string(),
            }
        }
    }
}
