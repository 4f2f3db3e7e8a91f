//! Tokio-backed scheduler.
//!
//! Scopes are single-threaded (`!Send`), so their callbacks run as local
//! tasks. [`TokioScheduler::schedule`] must be called from inside a
//! [`tokio::task::LocalSet`]; outside one, `spawn_local` panics.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::task::AbortHandle;

use super::{Callback, Scheduler, TaskHandle};

/// Runs callbacks on the current tokio `LocalSet` after a timer.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    tasks: Rc<RefCell<HashMap<TaskHandle, AbortHandle>>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks scheduled and not yet started or cancelled.
    pub fn pending_count(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = TaskHandle::next();
        let tasks = Rc::clone(&self.tasks);

        // The spawned task cannot run before this function returns, so the
        // abort handle is always registered before the task removes it.
        let join = tokio::task::spawn_local(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            } else {
                tokio::task::yield_now().await;
            }
            tasks.borrow_mut().remove(&handle);
            callback();
        });

        self.tasks.borrow_mut().insert(handle, join.abort_handle());
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        if let Some(task) = self.tasks.borrow_mut().remove(&handle) {
            task.abort();
            tracing::trace!(?handle, "cancelled scheduled callback");
        }
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("pending", &self.pending_count())
            .finish()
    }
}
