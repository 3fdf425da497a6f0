//! Sync driver: the page-walk loop and its session state machine

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::accumulator::ProgressAccumulator;
use super::backoff::{Decision, decide};
use super::cancel::CancellationToken;
use super::fetch::PageFetcher;
use super::outcome::{ErrorRecord, SyncOutcome};
use super::progress::{ProgressReporter, ProgressSnapshot, SyncStatus};
use super::request::SyncRequest;
use super::timing::{Sleeper, SyncTiming, TokenSleeper};

/// Why a session ended in [`SyncStatus::Error`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncFailure {
    /// The proxy returned a fatal error (message is already user-facing)
    #[error("{message}")]
    Aborted { message: String },

    #[error("No new rides found in {batches} pages in a row; stopping the import")]
    NoProgress { batches: u32 },

    #[error("Page {page} kept failing ({reason}) after {attempts} attempts; stopping the import")]
    RetriesExhausted {
        page: u32,
        attempts: u32,
        reason: String,
    },

    #[error("Import stopped after reaching its {limit_secs}s time limit")]
    TimedOut { limit_secs: u64 },
}

/// Misuse of the driver API
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("Import session is {status}; reset it before starting again")]
    NotIdle { status: SyncStatus },
}

/// Mutable state of one import run, owned by the driver
#[derive(Debug, Clone, Default)]
pub struct SyncSession {
    status: SyncStatus,
    current_page: u32,
    next_page: Option<u32>,
    progress: ProgressAccumulator,
    consecutive_no_progress: u32,
    consecutive_retries: u32,
    batches: u32,
    done: bool,
    failure: Option<SyncFailure>,
    message: String,
}

impl SyncSession {
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn next_page(&self) -> Option<u32> {
        self.next_page
    }

    pub fn progress(&self) -> &ProgressAccumulator {
        &self.progress
    }

    pub fn total_imported(&self) -> usize {
        self.progress.total_imported()
    }

    pub fn error_records(&self) -> &[ErrorRecord] {
        self.progress.error_records()
    }

    pub fn consecutive_no_progress(&self) -> u32 {
        self.consecutive_no_progress
    }

    /// Fetches of the current page that ended in a retry
    pub fn consecutive_retries(&self) -> u32 {
        self.consecutive_retries
    }

    /// Number of pages merged so far
    pub fn batches(&self) -> u32 {
        self.batches
    }

    pub fn failure(&self) -> Option<&SyncFailure> {
        self.failure.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            status: self.status,
            current_page: self.current_page,
            next_page: self.next_page,
            imported_total: self.progress.total_imported(),
            last_batch_count: self.progress.last_batch_count(),
            error_count: self.progress.error_records().len(),
            done: self.done,
            message: self.message.clone(),
        }
    }
}

/// How a run ended
enum Ending {
    Done,
    Cancelled,
    Failed(SyncFailure),
}

/// Walks the proxy's pages until the import is done, fails or is cancelled
///
/// Pages are fetched strictly one after another; each page's cursor comes
/// from the previous response. Transient failures retry the same page after
/// the backoff wait, so a page is never skipped and never merged twice in a
/// way that inflates the total.
pub struct SyncDriver<F> {
    fetcher: F,
    sleeper: Arc<dyn Sleeper>,
    timing: SyncTiming,
    session: SyncSession,
}

impl<F: PageFetcher> SyncDriver<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            sleeper: Arc::new(TokenSleeper),
            timing: SyncTiming::default(),
            session: SyncSession::default(),
        }
    }

    pub fn with_timing(mut self, timing: SyncTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Drop the current session so a new run can start
    pub fn reset(&mut self) {
        self.session = SyncSession::default();
    }

    /// Run one import to completion
    ///
    /// Only an idle session can run; call [`reset`](Self::reset) after a
    /// previous run. The returned session is in a terminal state. Progress
    /// made before a cancel or a fatal error is kept.
    pub fn run(
        &mut self,
        request: SyncRequest,
        cancel: &CancellationToken,
        reporter: &dyn ProgressReporter,
    ) -> Result<&SyncSession, SyncError> {
        if self.session.status != SyncStatus::Idle {
            return Err(SyncError::NotIdle {
                status: self.session.status,
            });
        }

        let request = request.clamped();
        self.session.status = SyncStatus::Importing;
        self.session.current_page = request.page;
        self.session.message = "Starting import...".to_string();
        info!(
            "Starting ride import from page {} ({} days, {} per page, batch limit {})",
            request.page, request.window_days, request.page_size, request.batch_limit
        );
        reporter.publish(&self.session.snapshot());

        let ending = self.walk_pages(request, cancel, reporter);
        self.finish(ending, reporter);
        Ok(&self.session)
    }

    fn walk_pages(
        &mut self,
        request: SyncRequest,
        cancel: &CancellationToken,
        reporter: &dyn ProgressReporter,
    ) -> Ending {
        let started = Instant::now();

        loop {
            if cancel.is_signaled() {
                return Ending::Cancelled;
            }
            if let Some(limit) = self.timing.max_session {
                if started.elapsed() >= limit {
                    return Ending::Failed(SyncFailure::TimedOut {
                        limit_secs: limit.as_secs(),
                    });
                }
            }

            let page = self.session.current_page;
            let outcome = match self.fetcher.fetch(&request.for_page(page), cancel) {
                Ok(outcome) => outcome,
                Err(_) => return Ending::Cancelled,
            };
            debug!("Page {} returned {}", page, outcome.kind());

            let (next_page, batch) = match (decide(&outcome), outcome) {
                (Decision::Proceed { next_page }, SyncOutcome::Success(batch)) => {
                    (next_page, batch)
                }
                (Decision::Proceed { .. }, other) => {
                    return Ending::Failed(SyncFailure::Aborted {
                        message: format!("Unexpected {} response from the server", other.kind()),
                    });
                }
                (Decision::Abort { message }, _) => {
                    return Ending::Failed(SyncFailure::Aborted { message });
                }
                (Decision::RetrySamePage { wait, reason }, outcome) => {
                    // A soft rate limit may still carry rides imported before the limit hit
                    if let SyncOutcome::Success(partial) = &outcome {
                        self.session.progress.merge(partial);
                    }
                    self.session.consecutive_retries += 1;
                    if self.session.consecutive_retries >= self.timing.no_progress_limit {
                        return Ending::Failed(SyncFailure::RetriesExhausted {
                            page,
                            attempts: self.session.consecutive_retries,
                            reason: reason.describe().to_string(),
                        });
                    }
                    warn!(
                        "{} on page {} ({}), retrying in {}s",
                        reason.describe(),
                        page,
                        outcome.kind(),
                        wait.as_secs_f32()
                    );
                    self.session.next_page = Some(page);
                    self.session.message = format!(
                        "{}. Retrying page {} in {}s...",
                        reason.describe(),
                        page,
                        wait.as_secs()
                    );
                    reporter.publish(&self.session.snapshot());

                    if self.sleeper.sleep(wait, cancel).is_err() {
                        return Ending::Cancelled;
                    }
                    continue;
                }
            };

            let newly_added = self.session.progress.merge(&batch);
            self.session.consecutive_retries = 0;
            self.session.batches += 1;
            if newly_added == 0 {
                self.session.consecutive_no_progress += 1;
            } else {
                self.session.consecutive_no_progress = 0;
            }
            info!(
                "Page {}: {} rides reported, {} new, {} total",
                page,
                batch.imported_count,
                newly_added,
                self.session.progress.total_imported()
            );
            for record in &batch.error_records {
                warn!(
                    "Page {}: ride {} failed to import: {}",
                    page,
                    record.ride_id().as_deref().unwrap_or("?"),
                    record.reason().unwrap_or("unknown reason")
                );
            }

            if self.session.consecutive_no_progress >= self.timing.no_progress_limit {
                return Ending::Failed(SyncFailure::NoProgress {
                    batches: self.session.consecutive_no_progress,
                });
            }

            if batch.done {
                self.session.done = true;
                self.session.next_page = None;
                return Ending::Done;
            }

            let next = resolve_next_page(page, next_page);
            self.session.next_page = Some(next);
            self.session.message = format!(
                "Imported {} rides so far (page {} added {})",
                self.session.progress.total_imported(),
                page,
                newly_added
            );
            reporter.publish(&self.session.snapshot());
            self.session.current_page = next;

            if self.sleeper.sleep(self.timing.batch_pause, cancel).is_err() {
                return Ending::Cancelled;
            }
        }
    }

    fn finish(&mut self, ending: Ending, reporter: &dyn ProgressReporter) {
        let total = self.session.progress.total_imported();
        match ending {
            Ending::Done => {
                self.session.status = SyncStatus::Done;
                self.session.message = format!("Import complete: {} rides imported", total);
                info!("Ride import complete: {} rides in {} pages", total, self.session.batches);
            }
            Ending::Cancelled => {
                self.session.status = SyncStatus::Cancelled;
                self.session.message = format!("Import cancelled: {} rides imported", total);
                info!("Ride import cancelled after {} rides", total);
            }
            Ending::Failed(failure) => {
                self.session.status = SyncStatus::Error;
                self.session.message = failure.to_string();
                error!(
                    "Ride import failed on page {}: {} ({} rides kept)",
                    self.session.current_page, failure, total
                );
                self.session.failure = Some(failure);
            }
        }
        reporter.publish(&self.session.snapshot());
    }
}

/// Page to request after `current`
///
/// The server cursor wins when it does not move backwards; a missing or
/// backwards cursor falls back to the following page.
pub fn resolve_next_page(current: u32, server_next: Option<i64>) -> u32 {
    match server_next {
        Some(next) if next >= i64::from(current) => u32::try_from(next).unwrap_or(u32::MAX),
        _ => current.saturating_add(1),
    }
}
