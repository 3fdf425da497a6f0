//! Read-only progress surface for the presentation layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an import session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Importing,
    Done,
    Error,
    Cancelled,
}

impl SyncStatus {
    /// Done, Error and Cancelled need a reset before another run
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncStatus::Done | SyncStatus::Error | SyncStatus::Cancelled)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Importing => "importing",
            SyncStatus::Done => "done",
            SyncStatus::Error => "error",
            SyncStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a session, published after every state change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: SyncStatus,
    pub current_page: u32,
    /// Page the driver will request next, when known
    pub next_page: Option<u32>,
    pub imported_total: usize,
    pub last_batch_count: usize,
    pub error_count: usize,
    pub done: bool,
    pub message: String,
}

/// Observer notified with every snapshot
///
/// Implementations only get a shared reference; they cannot steer the
/// driver. Closures work too.
pub trait ProgressReporter: Send + Sync {
    fn publish(&self, snapshot: &ProgressSnapshot);
}

impl<F> ProgressReporter for F
where
    F: Fn(&ProgressSnapshot) + Send + Sync,
{
    fn publish(&self, snapshot: &ProgressSnapshot) {
        self(snapshot)
    }
}

/// Reporter that drops everything
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn publish(&self, _snapshot: &ProgressSnapshot) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_terminal_states() {
        assert!(!SyncStatus::Idle.is_terminal());
        assert!(!SyncStatus::Importing.is_terminal());
        assert!(SyncStatus::Done.is_terminal());
        assert!(SyncStatus::Error.is_terminal());
        assert!(SyncStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Mutex::new(Vec::new());
        let reporter = |s: &ProgressSnapshot| seen.lock().unwrap().push(s.status);

        reporter.publish(&ProgressSnapshot::default());
        reporter.publish(&ProgressSnapshot {
            status: SyncStatus::Done,
            ..ProgressSnapshot::default()
        });

        assert_eq!(*seen.lock().unwrap(), vec![SyncStatus::Idle, SyncStatus::Done]);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SyncStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
