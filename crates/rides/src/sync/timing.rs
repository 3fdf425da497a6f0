//! Pacing for the sync loop
//!
//! All waits go through a [`Sleeper`] so tests can record backoff
//! durations instead of sleeping through them.

use std::time::Duration;

use super::cancel::{Cancelled, CancellationToken};

/// Pause between successful batches to ease upstream rate limits
pub const BATCH_PAUSE: Duration = Duration::from_millis(250);

/// Consecutive batches without a new ride before the import gives up
pub const NO_PROGRESS_LIMIT: u32 = 30;

/// Loop pacing and guard settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTiming {
    pub batch_pause: Duration,
    pub no_progress_limit: u32,
    /// Optional wall-clock ceiling for a whole session (None = unbounded)
    pub max_session: Option<Duration>,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            batch_pause: BATCH_PAUSE,
            no_progress_limit: NO_PROGRESS_LIMIT,
            max_session: None,
        }
    }
}

/// Interruptible wait
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`, or until `cancel` is signaled
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled>;
}

/// Real sleeper that blocks on the cancellation token
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenSleeper;

impl Sleeper for TokenSleeper {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        cancel.wait_timeout(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_default_timing() {
        let timing = SyncTiming::default();
        assert_eq!(timing.batch_pause, Duration::from_millis(250));
        assert_eq!(timing.no_progress_limit, 30);
        assert!(timing.max_session.is_none());
    }

    #[test]
    fn test_token_sleeper_waits() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(TokenSleeper.sleep(Duration::from_millis(20), &token).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_token_sleeper_observes_cancel() {
        let token = CancellationToken::new();
        token.signal();
        assert_eq!(TokenSleeper.sleep(Duration::from_secs(60), &token), Err(Cancelled));
    }
}
