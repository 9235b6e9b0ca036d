//! Cooperative cancellation and wait handles.
//!
//! Every blocking point in the crate goes through [`CancellationScope::wait_one`], so a
//! cancelled scope is observed at the next suspension point of every thread waiting on it.
//!
//! Lost-wakeup freedom: `cancel` flips the flag while holding the scope registry lock and then
//! takes each registered signal's own lock before notifying. A waiter checks the flag while
//! holding the signal lock, so it either observes the flag or is already parked on the condvar
//! when the notification arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

use crate::core::lock_unpoisoned;

/// Result of [`CancellationScope::wait_one`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    Cancelled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResetMode {
    /// A successful wait consumes the signal.
    Auto,
    /// The signal stays set until [`Signal::reset`].
    Manual,
}

struct SignalInner {
    set: Mutex<bool>,
    cvar: Condvar,
    mode: ResetMode,
}

impl SignalInner {
    fn wake_all(&self) {
        let _guard = lock_unpoisoned(&self.set);
        self.cvar.notify_all();
    }
}

/// Wait handle observed through a [`CancellationScope`].
#[derive(Clone)]
pub struct Signal {
    inner: Arc<SignalInner>,
}

impl Signal {
    /// Event that wakes a single wait and clears itself.
    pub fn auto_reset() -> Self {
        Self::with_mode(ResetMode::Auto, false)
    }

    /// Event that stays set until explicitly reset.
    pub fn manual_reset(initially_set: bool) -> Self {
        Self::with_mode(ResetMode::Manual, initially_set)
    }

    fn with_mode(mode: ResetMode, initially_set: bool) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                set: Mutex::new(initially_set),
                cvar: Condvar::new(),
                mode,
            }),
        }
    }

    pub fn set(&self) {
        let mut set = lock_unpoisoned(&self.inner.set);
        *set = true;
        self.inner.cvar.notify_all();
    }

    pub fn reset(&self) {
        *lock_unpoisoned(&self.inner.set) = false;
    }

    pub fn is_set(&self) -> bool {
        *lock_unpoisoned(&self.inner.set)
    }
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("mode", &self.inner.mode)
            .field("set", &self.is_set())
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    signals: Vec<Weak<SignalInner>>,
    children: Vec<Weak<ScopeInner>>,
}

#[derive(Default)]
struct ScopeInner {
    cancelled: AtomicBool,
    registry: Mutex<Registry>,
}

impl ScopeInner {
    fn cancel(&self) {
        let (signals, children) = {
            let mut registry = lock_unpoisoned(&self.registry);
            if self.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
            (
                std::mem::take(&mut registry.signals),
                std::mem::take(&mut registry.children),
            )
        };

        for signal in signals.iter().filter_map(Weak::upgrade) {
            signal.wake_all();
        }
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// One-way (active to cancelled) stop signal shared by the threads of a session.
///
/// Clones share state. Cancelling a scope also cancels every scope created from it with
/// [`CancellationScope::child`].
#[derive(Clone, Default)]
pub struct CancellationScope {
    inner: Arc<ScopeInner>,
}

impl CancellationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope cancelled together with `self`, but cancellable on its own as well.
    pub fn child(&self) -> Self {
        let child = Self::new();
        let mut registry = lock_unpoisoned(&self.inner.registry);
        if self.is_cancelled() {
            drop(registry);
            child.cancel();
            return child;
        }
        registry.children.retain(|weak| weak.strong_count() > 0);
        registry.children.push(Arc::downgrade(&child.inner));
        child
    }

    /// Idempotent. Wakes every thread blocked in [`CancellationScope::wait_one`] on this scope.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Blocks until `signal` is set or this scope is cancelled.
    ///
    /// Cancellation wins when both hold. An auto-reset signal is consumed by a `Signaled`
    /// return; a manual-reset signal is left set.
    pub fn wait_one(&self, signal: &Signal) -> WaitOutcome {
        if !self.register(signal) {
            return WaitOutcome::Cancelled;
        }

        let inner = &signal.inner;
        let mut set = lock_unpoisoned(&inner.set);
        loop {
            if self.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if *set {
                if inner.mode == ResetMode::Auto {
                    *set = false;
                }
                return WaitOutcome::Signaled;
            }
            set = inner
                .cvar
                .wait(set)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Returns `false` if the scope is already cancelled.
    fn register(&self, signal: &Signal) -> bool {
        let mut registry = lock_unpoisoned(&self.inner.registry);
        if self.is_cancelled() {
            return false;
        }
        registry.signals.retain(|weak| weak.strong_count() > 0);
        let target = Arc::as_ptr(&signal.inner);
        if !registry
            .signals
            .iter()
            .any(|weak| std::ptr::eq(weak.as_ptr(), target))
        {
            registry.signals.push(Arc::downgrade(&signal.inner));
        }
        true
    }
}

impl std::fmt::Debug for CancellationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationScope")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
