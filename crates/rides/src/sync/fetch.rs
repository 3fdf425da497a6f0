//! Page fetcher seam between the driver and the transport

use std::sync::Arc;

use super::cancel::{Cancelled, CancellationToken};
use super::outcome::SyncOutcome;
use super::request::SyncRequest;

/// Performs one page request against the sync proxy
///
/// Implementations must not panic on bad responses; every failure is an
/// outcome value. `Err(Cancelled)` means the token fired while the call was
/// pending and the result (if any) was discarded.
pub trait PageFetcher: Send + Sync {
    fn fetch(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, Cancelled>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    fn fetch(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, Cancelled> {
        (**self).fetch(request, cancel)
    }
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch(
        &self,
        request: &SyncRequest,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome, Cancelled> {
        (**self).fetch(request, cancel)
    }
}
