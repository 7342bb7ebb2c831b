//! Epoch-based cancellation for long-running commands.
//!
//! A `CancelSource` owns a generation counter. Every `token()` snapshots the
//! current generation; `cancel_all()` bumps it, which makes every token taken
//! before the bump report cancelled. Starting a new decode therefore
//! cancels the previous one without tracking individual tokens.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default)]
pub struct CancelSource {
    epoch: Arc<AtomicU64>,
}

impl CancelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token bound to the current generation.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            epoch: Arc::clone(&self.epoch),
            issued: self.epoch.load(Ordering::SeqCst),
        }
    }

    /// Cancel every outstanding token, then hand out a fresh one.
    pub fn renew(&self) -> CancelToken {
        self.cancel_all();
        self.token()
    }

    pub fn cancel_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Shared counter, for handing to `Workers::new`.
    pub fn epoch_ref(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.epoch)
    }

    pub fn current(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Cooperative cancellation flag passed into long-running work.
#[derive(Debug, Clone)]
pub struct CancelToken {
    epoch: Arc<AtomicU64>,
    issued: u64,
}

impl CancelToken {
    /// Token that never cancels (synchronous callers, tests).
    pub fn never() -> Self {
        Self {
            epoch: Arc::new(AtomicU64::new(0)),
            issued: 0,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) != self.issued
    }

    pub fn epoch(&self) -> u64 {
        self.issued
    }
}
