//! Cancellation context (`Cx`) for sqlbridge.
//!
//! A `Cx` is cloned into every long-running operation. The operation polls
//! [`Cx::checkpoint`] at its yield points and waits with [`Cx::sleep`], which
//! wakes as soon as any holder of the context requests cancellation. Both
//! return [`BridgeError::Cancelled`], never an engine status.
//!
//! ```
//! use std::time::Duration;
//! use sqlbridge_types::Cx;
//!
//! let cx = Cx::new();
//! let handle = cx.clone();
//! handle.cancel();
//! assert!(cx.sleep(Duration::from_secs(60)).is_err());
//! ```

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use sqlbridge_error::{BridgeError, Result};

/// Reason for cancellation, ordered from weakest to strongest.
///
/// Multiple cancel requests are monotone: the strongest reason wins and the
/// reason can never get weaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CancelReason {
    Timeout = 0,
    UserInterrupt = 1,
    Shutdown = 2,
    Abort = 3,
}

#[derive(Debug)]
struct CxInner {
    cancel_requested: AtomicBool,
    cancel_reason: Mutex<Option<CancelReason>>,
    // Dropped children are pruned on the next `create_child`.
    children: Mutex<Vec<Weak<Self>>>,
    // Sleepers park on `wake` while holding `wake_lock`.
    wake_lock: Mutex<()>,
    wake: Condvar,
}

impl CxInner {
    fn new() -> Self {
        Self {
            cancel_requested: AtomicBool::new(false),
            cancel_reason: Mutex::new(None),
            children: Mutex::new(Vec::new()),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
        }
    }
}

/// Propagate cancellation to a `CxInner` node and all its descendants.
///
/// Each node's lock is released before recursing into children.
fn propagate_cancel(inner: &CxInner, reason: CancelReason) {
    inner.cancel_requested.store(true, Ordering::Release);

    {
        let mut r = inner.cancel_reason.lock();
        match *r {
            Some(existing) if existing >= reason => {}
            _ => *r = Some(reason),
        }
    }

    {
        // Taking the lock orders this notify after any sleeper's flag check.
        let _guard = inner.wake_lock.lock();
        inner.wake.notify_all();
    }

    let children: Vec<Arc<CxInner>> = inner
        .children
        .lock()
        .iter()
        .filter_map(Weak::upgrade)
        .collect();
    for child in &children {
        propagate_cancel(child, reason);
    }
}

/// Cancellation context passed through long-running operations.
#[derive(Debug, Clone)]
pub struct Cx {
    inner: Arc<CxInner>,
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

impl Cx {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CxInner::new()),
        }
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// Request cancellation with the default reason (`UserInterrupt`).
    ///
    /// Propagates to all child contexts and wakes every sleeper.
    pub fn cancel(&self) {
        self.cancel_with_reason(CancelReason::UserInterrupt);
    }

    /// Request cancellation with an explicit reason.
    pub fn cancel_with_reason(&self, reason: CancelReason) {
        propagate_cancel(&self.inner, reason);
    }

    /// The strongest cancellation reason set so far, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        *self.inner.cancel_reason.lock()
    }

    /// Check for cancellation at a yield point.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Cancelled`] once cancellation was requested.
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancel_requested() {
            return Err(BridgeError::Cancelled);
        }
        Ok(())
    }

    /// Wait for `duration`, returning early if cancellation is requested.
    ///
    /// Cancellation is checked before the wait begins, so a context that is
    /// already cancelled never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Cancelled`] if cancellation was requested
    /// before or during the wait.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.checkpoint()?;
        if duration.is_zero() {
            return Ok(());
        }
        let deadline = Instant::now() + duration;
        let mut guard = self.inner.wake_lock.lock();
        loop {
            if self.is_cancel_requested() {
                return Err(BridgeError::Cancelled);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            self.inner.wake.wait_for(&mut guard, deadline - now);
        }
    }

    /// Create a child `Cx` with independent cancellation state. Cancelling
    /// the parent propagates to this child; cancelling the child does not
    /// affect the parent.
    ///
    /// The parent holds its children weakly; a child lives exactly as long
    /// as its own clones.
    #[must_use]
    pub fn create_child(&self) -> Self {
        let child = Self::new();
        {
            let mut children = self.inner.children.lock();
            children.retain(|c| c.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }
        if let Some(reason) = self.cancel_reason() {
            child.cancel_with_reason(reason);
        }
        child
    }
}
