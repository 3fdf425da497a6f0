//! Bulk ride-import engine
//!
//! Pulls a user's historical rides through the sync proxy one page at a
//! time. Retries transient failures with bounded backoff, de-duplicates
//! rides across overlapping pages, and stops cooperatively on cancel.

mod accumulator;
mod backoff;
mod cancel;
mod driver;
mod fetch;
mod messages;
mod outcome;
mod progress;
mod request;
mod timing;

pub use accumulator::ProgressAccumulator;
pub use backoff::{Decision, RetryReason, decide, rate_limit_wait};
pub use cancel::{CancellationToken, Cancelled};
pub use driver::{SyncDriver, SyncError, SyncFailure, SyncSession, resolve_next_page};
pub use fetch::PageFetcher;
pub use messages::humanize_failure;
pub use outcome::{ErrorRecord, ImportBatch, SyncOutcome};
pub use progress::{NoopReporter, ProgressReporter, ProgressSnapshot, SyncStatus};
pub use request::{MAX_BATCH_LIMIT, MAX_PAGE_SIZE, MAX_WINDOW_DAYS, SyncRequest};
pub use timing::{BATCH_PAUSE, NO_PROGRESS_LIMIT, Sleeper, SyncTiming, TokenSleeper};
