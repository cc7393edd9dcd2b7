//! Cancellation and deadline context threaded through every run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{JanitorError, JanitorResult};

/// Shared cancellation flag plus an optional deadline.
///
/// Clones share the same flag, so a handle kept by another thread can cancel a running stream.
/// The streaming engine checks the context between chunks; long-running transforms check it
/// periodically while scanning a column.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl RunContext {
    /// A context that is never cancelled unless [`RunContext::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancelled: Arc::default(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err` once the context is cancelled or past its deadline.
    pub fn check(&self) -> JanitorResult<()> {
        if self.is_cancelled() {
            return Err(JanitorError::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Err(JanitorError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_visible_through_clones() {
        let ctx = RunContext::new();
        let handle = ctx.clone();
        assert!(ctx.check().is_ok());
        handle.cancel();
        assert!(matches!(ctx.check(), Err(JanitorError::Cancelled)));
    }

    #[test]
    fn zero_timeout_is_expired() {
        let ctx = RunContext::with_timeout(Duration::ZERO);
        assert!(matches!(ctx.check(), Err(JanitorError::DeadlineExceeded)));
    }
}
