//! Sync proxy HTTP client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic. Each call runs on
//! a short-lived worker thread so the caller can stop waiting the moment
//! the import is cancelled; the abandoned call ends on its own timeout.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, warn};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use url::Url;

use super::parse::{outcome_from_response, parse_retry_after};
use crate::config::ImportSettings;
use crate::sync::{CancellationToken, Cancelled, PageFetcher, SyncOutcome, SyncRequest};

/// How often a pending call checks for cancellation
const CANCEL_POLL: Duration = Duration::from_millis(50);

/// HTTP page fetcher for the proxy's `/sync` endpoint
#[derive(Clone)]
pub struct ProxyClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    agent: ureq::Agent,
    sync_url: Url,
    cookie: Option<String>,
}

impl ProxyClient {
    /// Create a client from settings
    ///
    /// Fails if the base URL cannot be parsed or cannot carry a path.
    pub fn new(settings: &ImportSettings) -> Result<Self> {
        let mut sync_url = Url::parse(&settings.base_url)
            .with_context(|| format!("Invalid import base URL: {}", settings.base_url))?;
        sync_url
            .path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Import base URL cannot have a path: {}", settings.base_url))?
            .pop_if_empty()
            .push("sync");

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(settings.request_timeout()))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            inner: Arc::new(ClientInner {
                agent: config.into(),
                sync_url,
                cookie: settings.cookie_header(),
            }),
        })
    }

    /// Full URL for one page request, with clamped query parameters
    pub fn page_url(&self, request: &SyncRequest) -> Url {
        self.inner.page_url(request)
    }

    /// Perform one page request, blocking until it completes or times out
    pub fn fetch_blocking(&self, request: &SyncRequest) -> SyncOutcome {
        self.inner.call(request)
    }
}

impl ClientInner {
    fn page_url(&self, request: &SyncRequest) -> Url {
        let mut url = self.sync_url.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(request.query_pairs());
        url
    }

    fn call(&self, request: &SyncRequest) -> SyncOutcome {
        let url = self.page_url(request);
        debug!("POST {}", url);

        let mut builder = self
            .agent
            .post(url.as_str())
            .header("Accept", "application/json");
        if let Some(cookie) = &self.cookie {
            builder = builder.header("Cookie", cookie.as_str());
        }

        let mut response = match builder.send_json(serde_json::json!({})) {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => {
                return outcome_from_response(code, None, "", None);
            }
            Err(e @ ureq::Error::Timeout(_)) => {
                return SyncOutcome::TransportError {
                    message: format!("Request to the import service timed out: {}", e),
                };
            }
            Err(e) => {
                return SyncOutcome::TransportError {
                    message: format!("Could not reach the import service: {}", e),
                };
            }
        };

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));

        let body = match response.body_mut().read_to_string() {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read sync response body ({}): {}", status, e);
                String::new()
            }
        };

        outcome_from_response(
            status.as_u16(),
            status.canonical_reason(),
            &body,
            retry_after_header,
        )
    }
}

impl PageFetcher for ProxyClient {
    fn fetch(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, Cancelled> {
        cancel.check()?;

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let request = *request;
        let spawned = thread::Builder::new()
            .name(format!("ride-sync-page-{}", request.page))
            .spawn(move || {
                // The receiver is gone if the import was cancelled meanwhile
                let _ = tx.send(inner.call(&request));
            });
        if let Err(e) = spawned {
            return Ok(SyncOutcome::TransportError {
                message: format!("Could not start request: {}", e),
            });
        }

        loop {
            match rx.recv_timeout(CANCEL_POLL) {
                Ok(outcome) => return Ok(outcome),
                Err(RecvTimeoutError::Timeout) => cancel.check()?,
                Err(RecvTimeoutError::Disconnected) => {
                    return Ok(SyncOutcome::TransportError {
                        message: "Request worker stopped unexpectedly".to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> ProxyClient {
        let settings = ImportSettings {
            base_url: base_url.to_string(),
            ..ImportSettings::default()
        };
        ProxyClient::new(&settings).unwrap()
    }

    #[test]
    fn test_page_url_appends_sync_and_query() {
        let client = client("http://localhost:5175/api/strava/");
        let url = client.page_url(&SyncRequest {
            page: 3,
            window_days: 800,
            page_size: 50,
            batch_limit: 250,
            analyze: true,
        });
        assert_eq!(
            url.as_str(),
            "http://localhost:5175/api/strava/sync?days=365&page=3&per_page=50&batch_limit=200&analyze=1"
        );
    }

    #[test]
    fn test_page_url_without_trailing_slash() {
        let client = client("https://cyclegraph.example/api/strava");
        let url = client.page_url(&SyncRequest::default());
        assert_eq!(url.path(), "/api/strava/sync");
        assert!(url.query().unwrap().contains("analyze=0"));
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = ImportSettings {
            base_url: "not a url".to_string(),
            ..ImportSettings::default()
        };
        assert!(ProxyClient::new(&settings).is_err());

        let settings = ImportSettings {
            base_url: "mailto:rides@example.com".to_string(),
            ..ImportSettings::default()
        };
        assert!(ProxyClient::new(&settings).is_err());
    }

    #[test]
    fn test_cancelled_before_call() {
        let client = client("http://127.0.0.1:9/api/strava");
        let cancel = CancellationToken::new();
        cancel.signal();
        assert_eq!(client.fetch(&SyncRequest::default(), &cancel), Err(Cancelled));
    }
}
