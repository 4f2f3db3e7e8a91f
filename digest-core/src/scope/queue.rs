//! Deferred Work Queues
//!
//! A scope defers work in two tiers:
//!
//! - **Immediate tasks** (`eval_async`) run inside the current digest, or a
//!   digest scheduled right away if none is running. A task may enqueue more
//!   tasks; those drain in the same digest iteration.
//!
//! - **Deferred applies** (`apply_async`) are collected until one scheduled
//!   callback flushes them all inside a single `apply`, so any number of
//!   calls made before the callback fires cost exactly one digest. A digest
//!   that starts first cancels the callback and flushes the queue itself.

use std::collections::VecDeque;
use std::fmt;
use std::rc::Weak;

use super::{Scope, ScopeInner};
use crate::scheduler::TaskHandle;

/// Expression evaluated against a scope at a later point.
pub type Expression = Box<dyn FnOnce(&Scope)>;

/// A pending `eval_async` expression and the scope it belongs to.
pub(crate) struct AsyncTask {
    pub(crate) scope: Weak<ScopeInner>,
    pub(crate) expression: Expression,
}

/// Thunks waiting for the next apply-async flush, and the handle of the
/// scheduled flush if there is one.
#[derive(Default)]
pub(crate) struct ApplyAsyncQueue {
    pub(crate) thunks: VecDeque<Expression>,
    pub(crate) handle: Option<TaskHandle>,
}

impl fmt::Debug for ApplyAsyncQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyAsyncQueue")
            .field("pending", &self.thunks.len())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Clears the scheduled-flush handle when dropped.
struct FlushGuard<'a> {
    scope: &'a Scope,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.scope.inner.state.borrow_mut().apply_async.handle = None;
    }
}

impl Scope {
    /// Pop and evaluate immediate tasks until the queue is empty, including
    /// tasks enqueued by the tasks themselves.
    pub(crate) fn drain_async_queue(&self) {
        loop {
            let Some(task) = self.inner.state.borrow_mut().async_queue.pop_front() else {
                break;
            };
            match Scope::upgrade(&task.scope) {
                Some(scope) => scope.eval(task.expression),
                None => tracing::trace!("dropping immediate task for a released scope"),
            }
        }
    }

    /// Run every queued apply-async thunk in order and forget the scheduled
    /// flush. Thunks queued while flushing run in the same flush.
    ///
    /// The scheduled flush is forgotten even if a thunk panics; thunks left
    /// behind by the panic run with the next flush.
    pub(crate) fn flush_apply_async(&self) {
        let _flush = FlushGuard { scope: self };
        let mut flushed = 0usize;
        loop {
            let Some(thunk) = self.inner.state.borrow_mut().apply_async.thunks.pop_front() else {
                break;
            };
            thunk(self);
            flushed += 1;
        }
        tracing::trace!(flushed, "flushed apply-async queue");
    }

    /// Number of immediate tasks waiting to run.
    pub fn pending_async_count(&self) -> usize {
        self.inner.state.borrow().async_queue.len()
    }

    pub(crate) fn has_pending_async(&self) -> bool {
        !self.inner.state.borrow().async_queue.is_empty()
    }

    /// Number of apply-async expressions waiting for a flush.
    pub fn pending_apply_async_count(&self) -> usize {
        self.inner.state.borrow().apply_async.thunks.len()
    }

    /// Whether an apply-async flush is currently scheduled.
    pub fn has_scheduled_apply_async(&self) -> bool {
        self.inner.state.borrow().apply_async.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::scheduler::ManualScheduler;
    use crate::value::Value;

    #[test]
    fn drain_runs_tasks_in_order_including_nested() {
        let scope = Scope::new(ManualScheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));

        let outer_log = Rc::clone(&log);
        scope.eval_async(move |scope| {
            outer_log.borrow_mut().push("first");
            let nested_log = Rc::clone(&outer_log);
            scope.eval_async(move |_| nested_log.borrow_mut().push("nested"));
        });
        let second_log = Rc::clone(&log);
        scope.eval_async(move |_| second_log.borrow_mut().push("second"));

        scope.drain_async_queue();

        assert_eq!(*log.borrow(), vec!["first", "second", "nested"]);
        assert_eq!(scope.pending_async_count(), 0);
    }

    #[test]
    fn flush_runs_thunks_and_forgets_handle() {
        let scope = Scope::new(ManualScheduler::new());
        scope.apply_async(|scope| scope.set("a", 1));
        scope.apply_async(|scope| scope.set("b", 2));
        assert_eq!(scope.pending_apply_async_count(), 2);
        assert!(scope.has_scheduled_apply_async());

        scope.flush_apply_async();

        assert_eq!(scope.get("a"), Value::from(1));
        assert_eq!(scope.get("b"), Value::from(2));
        assert_eq!(scope.pending_apply_async_count(), 0);
        assert!(!scope.has_scheduled_apply_async());
    }

    #[test]
    fn panicking_thunk_still_forgets_handle() {
        let scope = Scope::new(ManualScheduler::new());
        scope.apply_async(|_| panic!("thunk failed"));
        scope.apply_async(|scope| scope.set("b", 2));

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scope.flush_apply_async()
        }));

        assert!(result.is_err());
        assert!(!scope.has_scheduled_apply_async());
        // The thunk behind the panicking one waits for the next flush.
        assert_eq!(scope.pending_apply_async_count(), 1);
    }
}
