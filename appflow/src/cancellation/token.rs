//! Cancellation token for cooperative cancellation.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::warn;

/// A callback type for cancellation notifications. Receives the reason.
pub type CancelCallback = Box<dyn Fn(&str) + Send + Sync>;

/// A token for cooperative cancellation.
///
/// Cancellation is idempotent - only the first cancellation reason is kept.
/// Holders either poll [`is_cancelled`](Self::is_cancelled) or await
/// [`cancelled`](Self::cancelled) alongside their own work.
#[derive(Default)]
pub struct CancellationToken {
    /// Whether cancellation has been requested.
    cancelled: AtomicBool,
    /// The reason for cancellation (first one wins).
    reason: RwLock<Option<String>>,
    /// Callbacks to invoke on cancellation.
    callbacks: RwLock<Vec<CancelCallback>>,
    /// Child tokens; entries whose child was dropped are pruned on registration.
    children: RwLock<Vec<Weak<CancellationToken>>>,
    /// Wakes tasks waiting in `cancelled()`.
    notify: Notify,
}

impl CancellationToken {
    /// Creates a new cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token that is cancelled whenever `parent` is.
    ///
    /// Cancelling the child does not affect the parent. The parent only holds
    /// a weak reference, so a long-lived parent does not accumulate children
    /// that have already been dropped.
    #[must_use]
    pub fn child(parent: &Arc<Self>) -> Arc<Self> {
        let child = Arc::new(Self::new());
        {
            // Same lock order as `cancel`: callbacks, then children.
            let _callbacks = parent.callbacks.write();
            if !parent.is_cancelled() {
                let mut children = parent.children.write();
                children.retain(|c| c.strong_count() > 0);
                children.push(Arc::downgrade(&child));
                return child;
            }
        }
        child.cancel(parent.reason().unwrap_or_default());
        child
    }

    /// Requests cancellation with a reason.
    ///
    /// This is idempotent - only the first reason is kept.
    /// Callbacks are invoked immediately. Panics in callbacks are logged and suppressed.
    pub fn cancel(&self, reason: impl Into<String>) {
        let (reason, callbacks, children) = {
            // Held across the flag flip so `on_cancel` never misses it.
            let mut callbacks = self.callbacks.write();
            if self.is_cancelled() {
                return;
            }
            let reason = reason.into();
            // Reason first, so anyone observing the flag also sees it.
            *self.reason.write() = Some(reason.clone());
            self.cancelled.store(true, Ordering::SeqCst);
            let children = std::mem::take(&mut *self.children.write());
            (reason, std::mem::take(&mut *callbacks), children)
        };

        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel(reason.as_str());
        }

        for callback in &callbacks {
            if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(&reason);
            })) {
                warn!("Cancellation callback panicked: {:?}", e);
            }
        }

        self.notify.notify_waiters();
    }

    /// Registers a callback to be invoked on cancellation.
    ///
    /// If already cancelled, the callback is invoked immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        {
            let mut callbacks = self.callbacks.write();
            if !self.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }

        let reason = self.reason().unwrap_or_default();
        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callback(&reason);
        })) {
            warn!("Cancellation callback panicked: {:?}", e);
        }
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Registered before the flag check so a concurrent cancel is not missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish()
    }
}

/// Cancels a token when dropped, unless disarmed.
///
/// Ties the lifetime of spawned work to the future that is joining it.
#[derive(Debug)]
pub struct CancelGuard {
    token: Option<Arc<CancellationToken>>,
    reason: &'static str,
}

impl CancelGuard {
    /// Creates a guard for `token`.
    #[must_use]
    pub fn new(token: Arc<CancellationToken>, reason: &'static str) -> Self {
        Self {
            token: Some(token),
            reason,
        }
    }

    /// Disarms the guard, leaving the token untouched on drop.
    pub fn disarm(&mut self) {
        self.token = None;
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel(self.reason);
        }
    }
}
