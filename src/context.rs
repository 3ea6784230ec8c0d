//! Cancellation sources shared between the event loop and spinner actions.
//!
//! A [`Context`] is a cheap, cloneable handle. Clones observe the same
//! cancellation state; children created with [`Context::child`] or
//! [`Context::with_timeout`] are cancelled together with their parent but can
//! also be cancelled on their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Why a context stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    parent: Option<Context>,
}

/// Cancellation signal source.
#[derive(Debug, Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// Create a root context that is only cancelled explicitly.
    pub fn new() -> Self {
        Self::build(None, None)
    }

    fn build(deadline: Option<Instant>, parent: Option<Context>) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline,
                parent,
            }),
        }
    }

    /// Derive a context that is cancelled when this one is.
    pub fn child(&self) -> Self {
        Self::build(None, Some(self.clone()))
    }

    /// Derive a context that additionally expires after `timeout`.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout), Some(self.clone()))
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.err().is_some()
    }

    /// Returns the reason this context is done, or `None` while it is live.
    ///
    /// An explicit cancel anywhere up the chain takes precedence over a
    /// deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Some(ContextError::Cancelled);
        }
        if let Some(parent) = &self.inner.parent
            && let Some(err) = parent.err()
        {
            return Some(err);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
