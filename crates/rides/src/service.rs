//! ImportService facade for the presentation layer
//!
//! Owns at most one running import. The UI talks to it through `start`,
//! `cancel`, and the read-only snapshot / subscription surface; it never
//! touches the session itself.

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use crate::config::ImportSettings;
use crate::models::ImportSummary;
use crate::proxy::ProxyClient;
use crate::sync::{
    CancellationToken, PageFetcher, ProgressReporter, ProgressSnapshot, Sleeper, SyncDriver,
    SyncRequest, SyncTiming, TokenSleeper,
};

/// Where the last-import note is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryTarget {
    /// `last-import.json` in the CycleGraph config directory
    ConfigDir,
    /// An explicit file
    File(PathBuf),
    /// Don't write a note
    Disabled,
}

/// State shared between the service and its worker thread
struct Shared {
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    latest: RwLock<ProgressSnapshot>,
    subscribers: RwLock<Vec<Arc<dyn ProgressReporter>>>,
}

impl ProgressReporter for Shared {
    fn publish(&self, snapshot: &ProgressSnapshot) {
        if let Ok(mut latest) = self.latest.write() {
            *latest = snapshot.clone();
        }

        // Clone the list so a subscriber may call back into the service
        let subscribers = match self.subscribers.read() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        for subscriber in subscribers {
            subscriber.publish(snapshot);
        }
    }
}

/// Runs ride imports one at a time on a background thread
pub struct ImportService<F> {
    fetcher: Arc<F>,
    sleeper: Arc<dyn Sleeper>,
    timing: SyncTiming,
    summary: SummaryTarget,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<ProgressSnapshot>>>,
}

impl ImportService<ProxyClient> {
    /// Service talking to the real proxy
    pub fn from_settings(settings: &ImportSettings) -> Result<Self> {
        Ok(Self::new(ProxyClient::new(settings)?))
    }
}

impl<F: PageFetcher + 'static> ImportService<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            sleeper: Arc::new(TokenSleeper),
            timing: SyncTiming::default(),
            summary: SummaryTarget::ConfigDir,
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                cancel: Mutex::new(None),
                latest: RwLock::new(ProgressSnapshot::default()),
                subscribers: RwLock::new(Vec::new()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_timing(mut self, timing: SyncTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_summary(mut self, summary: SummaryTarget) -> Self {
        self.summary = summary;
        self
    }

    /// Start an import in the background
    ///
    /// Returns `Ok(false)` without doing anything if an import is already
    /// running. Every run gets a fresh session and a fresh cancellation token.
    pub fn start(&self, request: SyncRequest) -> Result<bool> {
        // The token slot stays locked until the new token is in place, so a
        // concurrent `cancel` can only ever see the token of the run it stops
        let token = {
            let mut slot = self
                .shared
                .cancel
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self
                .shared
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                info!("Ride import already running; ignoring start request");
                return Ok(false);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        // Reap the previous, already finished worker
        if let Some(previous) = self.worker.lock().ok().and_then(|mut w| w.take()) {
            let _ = previous.join();
        }

        let fetcher = Arc::clone(&self.fetcher);
        let sleeper = Arc::clone(&self.sleeper);
        let timing = self.timing.clone();
        let summary = self.summary.clone();
        let shared = Arc::clone(&self.shared);

        let spawned = thread::Builder::new()
            .name("ride-import".to_string())
            .spawn(move || {
                let mut driver = SyncDriver::new(fetcher)
                    .with_sleeper(sleeper)
                    .with_timing(timing);

                let snapshot = match driver.run(request, &token, &*shared) {
                    Ok(session) => {
                        write_summary(&summary, &ImportSummary::from_session(session));
                        session.snapshot()
                    }
                    Err(e) => {
                        error!("Ride import could not start: {}", e);
                        shared
                            .latest
                            .read()
                            .map(|s| s.clone())
                            .unwrap_or_default()
                    }
                };
                shared.running.store(false, Ordering::Release);
                snapshot
            });

        match spawned {
            Ok(handle) => {
                if let Ok(mut worker) = self.worker.lock() {
                    *worker = Some(handle);
                }
                Ok(true)
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e).context("Failed to start ride import thread")
            }
        }
    }

    /// Ask the running import to stop; returns false if nothing was running
    ///
    /// Rides imported so far are kept.
    pub fn cancel(&self) -> bool {
        let slot = self
            .shared
            .cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !self.is_running() {
            return false;
        }
        match slot.as_ref() {
            Some(token) => {
                info!("Cancelling ride import");
                token.signal();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Latest published progress
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared
            .latest
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self, reporter: Arc<dyn ProgressReporter>) {
        if let Ok(mut subscribers) = self.shared.subscribers.write() {
            subscribers.push(reporter);
        }
    }

    /// Block until the current import finishes and return its final snapshot
    ///
    /// Returns `None` if no import was started since the last `wait`.
    pub fn wait(&self) -> Option<ProgressSnapshot> {
        let handle = self.worker.lock().ok().and_then(|mut w| w.take())?;
        match handle.join() {
            Ok(snapshot) => Some(snapshot),
            Err(_) => {
                error!("Ride import thread panicked");
                self.shared.running.store(false, Ordering::Release);
                None
            }
        }
    }
}

impl<F> Drop for ImportService<F> {
    fn drop(&mut self) {
        // The owning screen is gone; stop the import instead of orphaning it
        if let Ok(cancel) = self.shared.cancel.lock() {
            if let Some(token) = cancel.as_ref() {
                token.signal();
            }
        }
    }
}

fn write_summary(target: &SummaryTarget, summary: &ImportSummary) {
    let result = match target {
        SummaryTarget::ConfigDir => summary.save().map(|_| ()),
        SummaryTarget::File(path) => summary.save_to(path),
        SummaryTarget::Disabled => return,
    };
    if let Err(e) = result {
        warn!("Could not save last import summary: {:#}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Cancelled, ImportBatch, SyncOutcome, SyncStatus};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Waits for a go signal before answering each page
    struct GatedFetcher {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl PageFetcher for GatedFetcher {
        fn fetch(
            &self,
            request: &SyncRequest,
            cancel: &CancellationToken,
        ) -> Result<SyncOutcome, Cancelled> {
            let gate = self.gate.lock().unwrap();
            loop {
                cancel.check()?;
                if gate.recv_timeout(Duration::from_millis(10)).is_ok() {
                    break;
                }
            }
            Ok(SyncOutcome::Success(ImportBatch {
                imported_ids: vec![format!("ride-{}", request.page)],
                imported_count: 1,
                next_page: Some(i64::from(request.page) + 1),
                done: request.page >= 3,
                ..ImportBatch::default()
            }))
        }
    }

    fn gated() -> (ImportService<GatedFetcher>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let service = ImportService::new(GatedFetcher {
            gate: Mutex::new(rx),
        })
        .with_summary(SummaryTarget::Disabled)
        .with_timing(SyncTiming {
            batch_pause: Duration::ZERO,
            ..SyncTiming::default()
        });
        (service, tx)
    }

    #[test]
    fn test_second_start_is_noop() {
        let (service, gate) = gated();

        assert!(service.start(SyncRequest::default()).unwrap());
        assert!(!service.start(SyncRequest::default()).unwrap());
        assert!(service.is_running());

        for _ in 0..3 {
            gate.send(()).unwrap();
        }
        let last = service.wait().unwrap();
        assert_eq!(last.status, SyncStatus::Done);
        assert_eq!(last.imported_total, 3);
        assert!(!service.is_running());
    }

    #[test]
    fn test_cancel_running_import() {
        let (service, gate) = gated();
        assert!(!service.cancel());

        service.start(SyncRequest::default()).unwrap();
        gate.send(()).unwrap();
        assert!(service.cancel());

        let last = service.wait().unwrap();
        assert_eq!(last.status, SyncStatus::Cancelled);
        assert!(last.imported_total <= 1);
        assert_eq!(service.snapshot().status, SyncStatus::Cancelled);
    }

    #[test]
    fn test_restart_after_finish_uses_fresh_session() {
        let (service, gate) = gated();

        service.start(SyncRequest::default()).unwrap();
        service.cancel();
        service.wait().unwrap();

        assert!(service.start(SyncRequest::default().for_page(3)).unwrap());
        gate.send(()).unwrap();
        let last = service.wait().unwrap();
        assert_eq!(last.status, SyncStatus::Done);
        assert_eq!(last.imported_total, 1);
    }

    #[test]
    fn test_cancel_right_after_start_stops_that_run() {
        let (service, _gate) = gated();

        for _ in 0..20 {
            assert!(service.start(SyncRequest::default()).unwrap());
            assert!(service.cancel());

            let last = service.wait().unwrap();
            assert_eq!(last.status, SyncStatus::Cancelled);
            assert_eq!(last.imported_total, 0);
        }
    }

    #[test]
    fn test_cancel_from_another_thread_during_restart() {
        let (service, _gate) = gated();
        let service = Arc::new(service);

        for _ in 0..20 {
            let canceller = Arc::clone(&service);
            service.start(SyncRequest::default()).unwrap();
            thread::spawn(move || while !canceller.cancel() {})
                .join()
                .unwrap();

            assert_eq!(service.wait().unwrap().status, SyncStatus::Cancelled);
            assert!(!service.is_running());
        }
    }

    #[test]
    fn test_wait_without_start() {
        let (service, _gate) = gated();
        assert!(service.wait().is_none());
        assert_eq!(service.snapshot().status, SyncStatus::Idle);
    }
}
