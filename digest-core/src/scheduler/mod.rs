//! Scheduling
//!
//! Deferred digests need a way to run a callback "later": after the current
//! call stack has unwound and control is back in the host's event loop. The
//! scope does not own an event loop, so the host injects one through the
//! [`Scheduler`] trait.
//!
//! Two implementations are provided:
//!
//! - [`ManualScheduler`]: callbacks sit in a queue until the host runs them.
//!   Deterministic, with a virtual clock; suited to tests and to hosts that
//!   already pump their own loop.
//! - [`TokioScheduler`]: callbacks run as local tasks on a tokio `LocalSet`.

mod local;
mod manual;

pub use local::TokioScheduler;
pub use manual::ManualScheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Callback handed to a scheduler.
pub type Callback = Box<dyn FnOnce()>;

/// Identifies a scheduled callback so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    /// Generate a new unique handle.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Host capability for running callbacks later.
///
/// Implementations must never invoke `callback` synchronously from within
/// `schedule`.
pub trait Scheduler {
    /// Arrange for `callback` to run once, no sooner than `delay` from now.
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle;

    /// Prevent a scheduled callback from running. Cancelling a handle that
    /// already ran or was already cancelled does nothing.
    fn cancel(&self, handle: TaskHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let h1 = TaskHandle::next();
        let h2 = TaskHandle::next();
        let h3 = TaskHandle::next();

        assert_ne!(h1, h2);
        assert_ne!(h2, h3);
        assert!(h1.raw() < h3.raw());
    }
}
