//! Redirect coordinator — at most one dispatch per navigation.
//!
//! DESIGN
//! ======
//! Guard re-evaluation is driven by session-cache churn, which can produce
//! the same `Redirect` decision many times before navigation completes. The
//! coordinator assigns each navigation an epoch: the epoch advances when the
//! observed path changes, and a dispatch is valid only against the current
//! epoch, at most once. Arriving at a new path — not a timer — is what
//! re-enables redirecting.

use std::sync::{Arc, Mutex};

/// Identifier of one navigation. Obtained from
/// [`RedirectCoordinator::epoch_for`] and passed back when dispatching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavigationEpoch(u64);

struct CoordinatorInner {
    path: String,
    epoch: u64,
    issued: bool,
}

/// Tracks the redirect mark for the current navigation. Clone is cheap; all
/// clones share state.
#[derive(Clone)]
pub struct RedirectCoordinator {
    inner: Arc<Mutex<CoordinatorInner>>,
}

impl RedirectCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CoordinatorInner {
                path: String::new(),
                epoch: 0,
                issued: false,
            })),
        }
    }

    /// Epoch for the given path. A path different from the last observed one
    /// starts a fresh epoch with its redirect mark cleared.
    pub fn epoch_for(&self, path: &str) -> NavigationEpoch {
        let mut inner = self.lock();
        if inner.path != path {
            inner.path = path.to_string();
            inner.epoch += 1;
            inner.issued = false;
        }
        NavigationEpoch(inner.epoch)
    }

    /// Whether a redirect may still be dispatched for this epoch.
    #[must_use]
    pub fn should_issue(&self, epoch: NavigationEpoch) -> bool {
        let inner = self.lock();
        inner.epoch == epoch.0 && !inner.issued
    }

    /// Record that a redirect was dispatched for this epoch. A stale epoch
    /// is ignored — it can no longer affect the current navigation.
    pub fn mark_issued(&self, epoch: NavigationEpoch) {
        let mut inner = self.lock();
        if inner.epoch == epoch.0 {
            inner.issued = true;
        }
    }

    /// Atomically claim the dispatch for this epoch. Returns true exactly
    /// once per epoch, and never for a stale epoch.
    pub fn try_issue(&self, epoch: NavigationEpoch) -> bool {
        let mut inner = self.lock();
        if inner.epoch == epoch.0 && !inner.issued {
            inner.issued = true;
            true
        } else {
            false
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CoordinatorInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for RedirectCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
