//! Rides crate - bulk ride import for CycleGraph
//!
//! This crate provides the client side of the Strava history import:
//! - Sync proxy client (one page per call, cancellable)
//! - Backoff policy separating transient from fatal failures
//! - De-duplicating progress accumulator
//! - Sync driver state machine with a livelock guard
//! - Import service with start / cancel / progress snapshots
//!
//! This crate has zero UI dependencies; the presentation layer only reads
//! progress snapshots and calls `start` / `cancel`.

pub mod config;
pub mod models;
pub mod proxy;
pub mod service;
pub mod sync;

pub use config::ImportSettings;
pub use models::ImportSummary;
pub use proxy::ProxyClient;
pub use service::{ImportService, SummaryTarget};
pub use sync::{
    // Engine
    CancellationToken, Cancelled, PageFetcher, SyncDriver, SyncError, SyncFailure, SyncSession,
    // Data
    ErrorRecord, ImportBatch, SyncOutcome, SyncRequest,
    // Policy and pacing
    Decision, RetryReason, Sleeper, SyncTiming, TokenSleeper, decide,
    // Progress (for UI consumption)
    NoopReporter, ProgressReporter, ProgressSnapshot, SyncStatus,
};
