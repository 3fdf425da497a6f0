//! One-way cancellation signal shared between an import and its owner

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// Returned by fetchers and sleeps that observed a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Import cancelled")]
pub struct Cancelled;

/// Shared abort flag for one import session
///
/// Clones share the same flag. Once signaled it stays signaled; start a new
/// session with a fresh token. Waiting on the token wakes up as soon as it is
/// signaled, so backoff sleeps never delay a cancel.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    signaled: Mutex<bool>,
    wake: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation. Idempotent.
    pub fn signal(&self) {
        let mut signaled = self
            .inner
            .signaled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *signaled = true;
        self.inner.wake.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        self.inner
            .signaled
            .lock()
            .map(|s| *s)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    /// `Err(Cancelled)` if the token has been signaled
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_signaled() { Err(Cancelled) } else { Ok(()) }
    }

    /// Block for up to `timeout`, returning early if the token is signaled
    ///
    /// Returns `Err(Cancelled)` when the wait ended because of a cancel
    /// (including a cancel that happened before the call).
    pub fn wait_timeout(&self, timeout: Duration) -> Result<(), Cancelled> {
        let deadline = Instant::now() + timeout;
        let mut signaled = self
            .inner
            .signaled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Loop to absorb spurious wakeups
        while !*signaled {
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let (guard, _) = self
                .inner
                .wake
                .wait_timeout(signaled, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            signaled = guard;
        }
        Err(Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_is_idempotent() {
        let token = CancellationToken::new();
        assert!(!token.is_signaled());
        assert!(token.check().is_ok());

        token.signal();
        token.signal();
        assert!(token.is_signaled());
        assert_eq!(token.check(), Err(Cancelled));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancellationToken::new();
        let other = token.clone();
        other.signal();
        assert!(token.is_signaled());
    }

    #[test]
    fn test_wait_timeout_elapses() {
        let token = CancellationToken::new();
        let start = Instant::now();
        assert!(token.wait_timeout(Duration::from_millis(30)).is_ok());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_wait_after_signal_returns_immediately() {
        let token = CancellationToken::new();
        token.signal();
        let start = Instant::now();
        assert_eq!(token.wait_timeout(Duration::from_secs(10)), Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_signal_interrupts_wait() {
        let token = CancellationToken::new();
        let signaler = token.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            signaler.signal();
        });

        let start = Instant::now();
        let result = token.wait_timeout(Duration::from_secs(30));
        handle.join().unwrap();

        assert_eq!(result, Err(Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
