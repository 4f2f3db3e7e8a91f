//! Manually driven scheduler with a virtual clock.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use super::{Callback, Scheduler, TaskHandle};

struct Pending {
    due: Duration,
    handle: TaskHandle,
    callback: Callback,
}

#[derive(Default)]
struct Queue {
    now: Duration,
    tasks: Vec<Pending>,
}

impl Queue {
    /// Remove the earliest task that is due, ties broken by scheduling order.
    fn pop_due(&mut self) -> Option<Pending> {
        let now = self.now;
        let position = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| task.due <= now)
            .min_by_key(|(_, task)| (task.due, task.handle))
            .map(|(position, _)| position)?;
        Some(self.tasks.swap_remove(position))
    }
}

/// A scheduler whose callbacks only run when the host says so.
///
/// Time is virtual: a callback scheduled with a delay becomes due once the
/// clock has been [advanced](ManualScheduler::advance) past it. Clones share
/// the same queue, so a host keeps one clone and hands another to the scope.
///
/// ```rust,ignore
/// let scheduler = ManualScheduler::new();
/// let scope = Scope::new(scheduler.clone());
/// scope.apply_async(|scope| scope.set("a", 1));
/// scheduler.run_pending();
/// ```
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Rc<RefCell<Queue>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.queue.borrow().now
    }

    /// Number of callbacks scheduled and not yet run or cancelled.
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().tasks.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.borrow().tasks.is_empty()
    }

    /// Run the earliest due callback, if any.
    pub fn run_next(&self) -> bool {
        // Pop before running: the callback may schedule more work.
        let Some(task) = self.queue.borrow_mut().pop_due() else {
            return false;
        };
        tracing::trace!(handle = ?task.handle, "running scheduled callback");
        (task.callback)();
        true
    }

    /// Run due callbacks until none are left, including callbacks that
    /// become due while running. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Move the clock forward and run everything that became due.
    pub fn advance(&self, by: Duration) -> usize {
        self.queue.borrow_mut().now += by;
        self.run_pending()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, callback: Callback) -> TaskHandle {
        let handle = TaskHandle::next();
        let mut queue = self.queue.borrow_mut();
        let due = queue.now + delay;
        queue.tasks.push(Pending {
            due,
            handle,
            callback,
        });
        handle
    }

    fn cancel(&self, handle: TaskHandle) {
        self.queue
            .borrow_mut()
            .tasks
            .retain(|task| task.handle != handle);
    }
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &queue.now)
            .field("pending", &queue.tasks.len())
            .finish()
    }
}
