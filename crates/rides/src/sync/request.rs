//! Per-call parameters for the proxy sync endpoint

use serde::{Deserialize, Serialize};

/// Longest lookback window the proxy accepts, in days
pub const MAX_WINDOW_DAYS: u32 = 365;
/// Largest upstream page the proxy accepts
pub const MAX_PAGE_SIZE: u32 = 200;
/// Most activities the proxy imports in one call
pub const MAX_BATCH_LIMIT: u32 = 200;

/// Parameters for one page request
///
/// Values are clamped to the proxy's documented limits by [`SyncRequest::clamped`],
/// which the fetcher applies before every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// 1-based page cursor
    pub page: u32,
    /// Lookback horizon in days
    pub window_days: u32,
    /// Upstream activities per page
    pub page_size: u32,
    /// Max activities imported per call
    pub batch_limit: u32,
    /// Ask the proxy to run analysis on each imported ride
    pub analyze: bool,
}

impl Default for SyncRequest {
    fn default() -> Self {
        Self {
            page: 1,
            window_days: MAX_WINDOW_DAYS,
            page_size: 100,
            batch_limit: 50,
            analyze: false,
        }
    }
}

impl SyncRequest {
    /// Same parameters for another page
    pub fn for_page(self, page: u32) -> Self {
        Self { page, ..self }
    }

    /// Copy with every field forced into the accepted range
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            window_days: self.window_days.clamp(1, MAX_WINDOW_DAYS),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            batch_limit: self.batch_limit.clamp(1, MAX_BATCH_LIMIT),
            analyze: self.analyze,
        }
    }

    /// Query string pairs in the order the proxy documents them
    pub fn query_pairs(&self) -> [(&'static str, String); 5] {
        let r = self.clamped();
        [
            ("days", r.window_days.to_string()),
            ("page", r.page.to_string()),
            ("per_page", r.page_size.to_string()),
            ("batch_limit", r.batch_limit.to_string()),
            ("analyze", if r.analyze { "1" } else { "0" }.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_oversized_values() {
        let req = SyncRequest {
            page: 4,
            window_days: 10_000,
            page_size: 999,
            batch_limit: 500,
            analyze: true,
        }
        .clamped();

        assert_eq!(req.page, 4);
        assert_eq!(req.window_days, 365);
        assert_eq!(req.page_size, 200);
        assert_eq!(req.batch_limit, 200);
        assert!(req.analyze);
    }

    #[test]
    fn test_clamps_zero_values() {
        let req = SyncRequest {
            page: 0,
            window_days: 0,
            page_size: 0,
            batch_limit: 0,
            analyze: false,
        }
        .clamped();

        assert_eq!(req.page, 1);
        assert_eq!(req.window_days, 1);
        assert_eq!(req.page_size, 1);
        assert_eq!(req.batch_limit, 1);
    }

    #[test]
    fn test_query_pairs_are_clamped() {
        let req = SyncRequest {
            window_days: 900,
            analyze: true,
            ..SyncRequest::default()
        }
        .for_page(3);

        let pairs = req.query_pairs();
        assert_eq!(pairs[0], ("days", "365".to_string()));
        assert_eq!(pairs[1], ("page", "3".to_string()));
        assert_eq!(pairs[4], ("analyze", "1".to_string()));
    }
}
