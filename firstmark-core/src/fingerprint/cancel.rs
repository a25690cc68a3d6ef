//! Cooperative cancellation for long-running decodes.
//!
//! Decoders check the token between units of work and bail out with
//! `UnsupportedMedia` once it is cancelled or its deadline has passed, so a
//! timed-out decode releases its worker thread and buffers promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{FirstmarkError, Result};

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only trips when [`cancel`](Self::cancel) is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(UnsupportedMedia)` once the token has tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(FirstmarkError::unsupported("Decode cancelled"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());

        token.cancel();
        assert!(worker.is_cancelled());
        assert!(matches!(
            worker.check(),
            Err(FirstmarkError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn test_deadline_trips_without_cancel() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());
    }
}
