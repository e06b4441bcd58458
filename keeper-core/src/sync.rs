//! Cross-thread primitives shared between the transport and its owner.
//!
//! - [`VolatileCell`]: a mutex-guarded slot with read, write, swap and
//!   compare-and-swap. Every write happens-before the next read on any
//!   thread because both go through the same lock.
//! - [`AwaitableSignal`]: a resettable wake-up flag. Any thread may raise
//!   it; the single readiness loop awaits it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A synchronized single-value cell.
#[derive(Debug, Default)]
pub struct VolatileCell<T> {
    slot: Mutex<T>,
}

impl<T: Clone> VolatileCell<T> {
    /// Create a cell holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            slot: Mutex::new(value),
        }
    }

    /// Read the current value.
    pub fn get(&self) -> T {
        self.slot.lock().clone()
    }

    /// Overwrite the current value.
    pub fn set(&self, value: T) {
        *self.slot.lock() = value;
    }

    /// Store `value` and return the previous one.
    pub fn swap(&self, value: T) -> T {
        std::mem::replace(&mut *self.slot.lock(), value)
    }
}

impl<T: Clone + PartialEq> VolatileCell<T> {
    /// Store `new` only if the cell currently equals `current`.
    ///
    /// Returns the value observed before the operation, whether or not the
    /// exchange took place.
    pub fn compare_exchange(&self, current: &T, new: T) -> T {
        let mut slot = self.slot.lock();
        let observed = slot.clone();
        if observed == *current {
            *slot = new;
        }
        observed
    }
}

/// A resettable, awaitable wake-up flag.
///
/// `try_signal` is safe from any thread and never blocks. Raising an
/// already-raised signal is a no-op, so a burst of enqueues costs at most one
/// wake-up.
#[derive(Debug, Default)]
pub struct AwaitableSignal {
    signaled: AtomicBool,
    notify: Notify,
}

impl AwaitableSignal {
    /// Create a lowered signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` if this call raised it.
    pub fn try_signal(&self) -> bool {
        let raised = self
            .signaled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if raised {
            self.notify.notify_one();
        }
        raised
    }

    /// Lower the signal.
    pub fn reset(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    /// Whether the signal is currently raised.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Wait until the signal is raised.
    ///
    /// Returns immediately if it already is. Cancel safe.
    pub async fn wait(&self) {
        loop {
            if self.is_signaled() {
                return;
            }
            self.notify.notified().await;
        }
    }
}
