//! Watch Registry
//!
//! Each scope owns an ordered, append-only list of watchers. Registration
//! order is evaluation order within a digest pass, which lets a watcher
//! further down the list pick up a value derived by an earlier listener in
//! the same pass.
//!
//! The registry also owns the `last_dirty` cursor: the most recent watcher
//! found dirty. It is a plain index, valid because watchers are never
//! removed.

use std::fmt;
use std::mem;
use std::rc::Rc;

use super::equality::{are_equal, ComparisonStrategy};
use super::Scope;
use crate::value::Value;

/// Observation function: reads the scope and produces the watched value.
pub type WatchFn = Rc<dyn Fn(&Scope) -> Value>;

/// Reaction function: called with `(new_value, old_value, scope)`.
pub type ListenerFn = Rc<dyn Fn(&Value, &Value, &Scope)>;

/// Position of a watcher in its scope's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(usize);

impl WatchId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What a watcher last saw.
///
/// `Initial` is the sentinel for "never evaluated" and differs from every
/// `Value`, so the first evaluation always counts as a change.
enum Last {
    Initial,
    Seen(Value),
}

struct Watcher {
    watch_fn: WatchFn,
    listener_fn: ListenerFn,
    strategy: ComparisonStrategy,
    last: Last,
}

impl Watcher {
    /// Record `new_value` if it differs from the last observation.
    ///
    /// Returns the old value to hand to the listener, which is `new_value`
    /// itself on the first observation.
    fn record(&mut self, new_value: &Value) -> Option<Value> {
        if let Last::Seen(old_value) = &self.last {
            if are_equal(new_value, old_value, self.strategy) {
                return None;
            }
        }

        let stored = match self.strategy {
            ComparisonStrategy::Deep => new_value.deep_copy(),
            ComparisonStrategy::Reference => new_value.clone(),
        };

        match mem::replace(&mut self.last, Last::Seen(stored)) {
            Last::Initial => Some(new_value.clone()),
            Last::Seen(old_value) => Some(old_value),
        }
    }
}

/// Outcome of checking one watcher against a fresh observation.
pub(crate) enum Check {
    /// The value changed; the listener must be called with `old_value`.
    Dirty {
        listener_fn: ListenerFn,
        old_value: Value,
    },
    Clean,
    /// Clean, and this is the last watcher found dirty: every watcher has
    /// been re-checked since, so the rest of the pass is clean too.
    Settled,
}

#[derive(Default)]
pub(crate) struct WatchRegistry {
    watchers: Vec<Watcher>,
    last_dirty: Option<WatchId>,
}

impl WatchRegistry {
    pub(crate) fn push(
        &mut self,
        watch_fn: WatchFn,
        listener_fn: ListenerFn,
        strategy: ComparisonStrategy,
    ) -> WatchId {
        let id = WatchId(self.watchers.len());
        self.watchers.push(Watcher {
            watch_fn,
            listener_fn,
            strategy,
            last: Last::Initial,
        });
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.watchers.len()
    }

    pub(crate) fn last_dirty(&self) -> Option<WatchId> {
        self.last_dirty
    }

    pub(crate) fn reset_last_dirty(&mut self) {
        self.last_dirty = None;
    }

    /// Get the observation function of the watcher at `index`.
    pub(crate) fn watch_fn(&self, index: usize) -> Option<WatchFn> {
        self.watchers.get(index).map(|w| Rc::clone(&w.watch_fn))
    }

    /// Compare `new_value` with what watcher `id` saw last, recording it
    /// and moving the cursor when it changed.
    pub(crate) fn check(&mut self, id: WatchId, new_value: &Value) -> Check {
        let Some(watcher) = self.watchers.get_mut(id.0) else {
            return Check::Clean;
        };

        match watcher.record(new_value) {
            Some(old_value) => {
                let listener_fn = Rc::clone(&watcher.listener_fn);
                self.last_dirty = Some(id);
                Check::Dirty {
                    listener_fn,
                    old_value,
                }
            }
            None if self.last_dirty == Some(id) => Check::Settled,
            None => Check::Clean,
        }
    }

    pub(crate) fn id_at(&self, index: usize) -> Option<WatchId> {
        (index < self.watchers.len()).then_some(WatchId(index))
    }
}

impl fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("len", &self.watchers.len())
            .field("last_dirty", &self.last_dirty)
            .finish()
    }
}
