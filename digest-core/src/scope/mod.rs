//! Scopes
//!
//! A [`Scope`] holds arbitrary user state plus a list of watchers over it.
//! Callers mutate the state and then ask the scope to *digest*: every
//! watcher is re-evaluated, and each one whose value changed has its
//! listener called, over and over until nothing changes any more.
//!
//! # Entry Points
//!
//! - [`Scope::eval`]: run an expression against the scope, nothing else.
//! - [`Scope::apply`]: run an expression, then always digest.
//! - [`Scope::eval_async`]: run an expression inside the current or an
//!   imminent digest.
//! - [`Scope::apply_async`]: run an expression in a future apply, coalesced
//!   with every other `apply_async` made before it fires.
//! - [`Scope::digest`]: run the fixed-point loop directly.
//!
//! # Ownership
//!
//! `Scope` is a cheap handle; clones share the same state. The scope never
//! holds a borrow of its own state while user code runs, so watchers,
//! listeners and tasks can read and write properties, enqueue work and
//! register more watchers freely.
//!
//! # Example
//!
//! ```rust,ignore
//! let scope = Scope::new(ManualScheduler::new());
//! scope.set("name", "Deepak");
//! scope.watch(
//!     |scope| scope.get("name"),
//!     |new_value, _old, scope| scope.set("greeting", format!("Hi {new_value:?}")),
//! );
//! scope.digest()?;
//! ```

mod digest;
mod equality;
mod phase;
mod queue;
mod watcher;

pub use equality::{are_equal, ComparisonStrategy};
pub use phase::{Phase, PhaseGuard};
pub use queue::Expression;
pub use watcher::{ListenerFn, WatchFn, WatchId};

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::config::DigestConfig;
use crate::error::ScopeResult;
use crate::scheduler::Scheduler;
use crate::value::Value;
use queue::{ApplyAsyncQueue, AsyncTask};
use watcher::WatchRegistry;

/// Local bindings passed alongside the scope to [`Scope::eval_with`].
pub type Locals = IndexMap<String, Value>;

/// Mutable state behind a scope handle.
#[derive(Default)]
struct ScopeState {
    properties: IndexMap<String, Value>,
    watchers: WatchRegistry,
    async_queue: VecDeque<AsyncTask>,
    apply_async: ApplyAsyncQueue,
    phase: Option<Phase>,
}

pub(crate) struct ScopeInner {
    state: RefCell<ScopeState>,
    scheduler: Rc<dyn Scheduler>,
    config: DigestConfig,
}

/// A container of observed state and the watchers over it.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    /// Create an empty scope with the default configuration.
    ///
    /// Deferred work (`eval_async`, `apply_async`) goes through `scheduler`.
    pub fn new<S>(scheduler: S) -> Self
    where
        S: Scheduler + 'static,
    {
        Self::with_config(scheduler, DigestConfig::default())
    }

    pub fn with_config<S>(scheduler: S, config: DigestConfig) -> Self
    where
        S: Scheduler + 'static,
    {
        Self {
            inner: Rc::new(ScopeInner {
                state: RefCell::new(ScopeState::default()),
                scheduler: Rc::new(scheduler),
                config,
            }),
        }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.inner.config
    }

    fn downgrade(&self) -> Weak<ScopeInner> {
        Rc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<ScopeInner>) -> Option<Scope> {
        weak.upgrade().map(|inner| Scope { inner })
    }

    /// Check whether two handles refer to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Read a property. Missing properties read as [`Value::Undefined`].
    pub fn get(&self, key: &str) -> Value {
        self.inner
            .state
            .borrow()
            .properties
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Write a property. Nothing is re-evaluated until the next digest.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .state
            .borrow_mut()
            .properties
            .insert(key.into(), value.into());
    }

    /// Update a property from its current value.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let new_value = f(&self.get(key));
        self.set(key, new_value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.state.borrow().properties.contains_key(key)
    }

    /// Remove a property, returning its last value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow_mut().properties.shift_remove(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.borrow().properties.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Watchers
    // ------------------------------------------------------------------

    /// Register a watcher comparing by reference.
    pub fn watch<W, L>(&self, watch_fn: W, listener_fn: L) -> WatchId
    where
        W: Fn(&Scope) -> Value + 'static,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        self.watch_with(watch_fn, listener_fn, ComparisonStrategy::Reference)
    }

    /// Register a watcher without a listener.
    ///
    /// The watch function still runs on every pass.
    pub fn watch_only<W>(&self, watch_fn: W) -> WatchId
    where
        W: Fn(&Scope) -> Value + 'static,
    {
        self.watch(watch_fn, |_, _, _| {})
    }

    /// Register a watcher with an explicit comparison strategy.
    ///
    /// Watchers cannot be removed; they live as long as the scope.
    pub fn watch_with<W, L>(
        &self,
        watch_fn: W,
        listener_fn: L,
        strategy: ComparisonStrategy,
    ) -> WatchId
    where
        W: Fn(&Scope) -> Value + 'static,
        L: Fn(&Value, &Value, &Scope) + 'static,
    {
        let id = self.inner.state.borrow_mut().watchers.push(
            Rc::new(watch_fn),
            Rc::new(listener_fn),
            strategy,
        );
        tracing::trace!(watcher = id.index(), ?strategy, "registered watcher");
        id
    }

    pub fn watcher_count(&self) -> usize {
        self.inner.state.borrow().watchers.len()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Evaluate `expr` against this scope and return its result.
    ///
    /// No phase is entered and no digest runs.
    pub fn eval<R, F>(&self, expr: F) -> R
    where
        F: FnOnce(&Scope) -> R,
    {
        expr(self)
    }

    /// Evaluate `expr` against this scope and a set of local bindings.
    pub fn eval_with<R, F>(&self, locals: &Locals, expr: F) -> R
    where
        F: FnOnce(&Scope, &Locals) -> R,
    {
        expr(self, locals)
    }

    /// Evaluate `expr` in the apply phase, then digest.
    ///
    /// The digest runs whether `expr` returns or panics; a panic is resumed
    /// once the digest has finished. Fails without doing anything if another
    /// phase is active, and with the digest's error if the digest fails.
    pub fn apply<R, F>(&self, expr: F) -> ScopeResult<R>
    where
        F: FnOnce(&Scope) -> R,
    {
        let outcome = {
            let _phase = self.begin_phase(Phase::Apply)?;
            panic::catch_unwind(AssertUnwindSafe(|| self.eval(expr)))
        };

        let digested = self.digest();
        match outcome {
            Ok(value) => digested.map(|()| value),
            Err(payload) => {
                if let Err(err) = digested {
                    tracing::error!(%err, "digest after panicking apply failed");
                }
                panic::resume_unwind(payload)
            }
        }
    }

    /// Queue `expr` to run inside the current digest, or inside one
    /// scheduled for that purpose if the scope is idle.
    pub fn eval_async<F>(&self, expr: F)
    where
        F: FnOnce(&Scope) + 'static,
    {
        let schedule_digest = {
            let mut state = self.inner.state.borrow_mut();
            let schedule = state.phase.is_none() && state.async_queue.is_empty();
            state.async_queue.push_back(AsyncTask {
                scope: self.downgrade(),
                expression: Box::new(expr),
            });
            schedule
        };

        if schedule_digest {
            let weak = self.downgrade();
            self.inner.scheduler.schedule(
                self.inner.config.async_delay,
                Box::new(move || {
                    let Some(scope) = Scope::upgrade(&weak) else {
                        return;
                    };
                    if !scope.has_pending_async() {
                        return;
                    }
                    if let Err(err) = scope.digest() {
                        tracing::error!(%err, "scheduled eval_async digest failed");
                    }
                }),
            );
            tracing::debug!("scheduled digest for eval_async");
        }
    }

    /// Queue `expr` for the next apply-async flush, scheduling the flush if
    /// none is pending.
    pub fn apply_async<F>(&self, expr: F)
    where
        F: FnOnce(&Scope) + 'static,
    {
        let needs_flush = {
            let mut state = self.inner.state.borrow_mut();
            state
                .apply_async
                .thunks
                .push_back(Box::new(move |scope: &Scope| scope.eval(expr)));
            state.apply_async.handle.is_none()
        };

        if needs_flush {
            let weak = self.downgrade();
            let handle = self.inner.scheduler.schedule(
                self.inner.config.async_delay,
                Box::new(move || {
                    let Some(scope) = Scope::upgrade(&weak) else {
                        return;
                    };
                    if let Err(err) = scope.apply(|scope| scope.flush_apply_async()) {
                        tracing::error!(%err, "scheduled apply_async flush failed");
                    }
                }),
            );
            self.inner.state.borrow_mut().apply_async.handle = Some(handle);
            tracing::debug!(?handle, "scheduled apply_async flush");
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Scope")
            .field("properties", &state.properties)
            .field("watchers", &state.watchers)
            .field("pending_async", &state.async_queue.len())
            .field("apply_async", &state.apply_async)
            .field("phase", &state.phase)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::ScopeError;
    use crate::scheduler::ManualScheduler;

    #[test]
    fn scope_holds_properties() {
        let scope = Scope::new(ManualScheduler::new());
        scope.set("aProperty", 1);

        assert_eq!(scope.get("aProperty"), Value::from(1));
        assert!(scope.has("aProperty"));
        assert_eq!(scope.get("missing"), Value::Undefined);
        assert!(!scope.has("missing"));
    }

    #[test]
    fn properties_keep_insertion_order() {
        let scope = Scope::new(ManualScheduler::new());
        scope.set("b", 1);
        scope.set("a", 2);
        scope.update("b", |v| Value::from(v.as_f64().unwrap_or(0.0) + 1.0));

        assert_eq!(scope.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(scope.get("b"), Value::from(2));
        assert_eq!(scope.remove("b"), Some(Value::from(2)));
        assert_eq!(scope.keys(), vec!["a".to_string()]);
    }

    #[test]
    fn clones_share_state() {
        let scope = Scope::new(ManualScheduler::new());
        let other = scope.clone();

        other.set("shared", true);
        assert_eq!(scope.get("shared"), Value::from(true));
        assert!(scope.ptr_eq(&other));
    }

    #[test]
    fn eval_returns_result_without_digesting() {
        let scope = Scope::new(ManualScheduler::new());
        scope.set("aValue", 42);
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        scope.watch_only(move |_| {
            counter.set(counter.get() + 1);
            Value::Null
        });

        let result = scope.eval(|scope| scope.get("aValue"));

        assert_eq!(result, Value::from(42));
        assert_eq!(calls.get(), 0);
        assert_eq!(scope.phase(), None);
    }

    #[test]
    fn eval_passes_locals() {
        let scope = Scope::new(ManualScheduler::new());
        scope.set("aValue", 42);
        let locals = Locals::from([("anotherValue".to_string(), Value::from(2))]);

        let sum = scope.eval_with(&locals, |scope, locals| {
            scope.get("aValue").as_f64().unwrap_or_default()
                + locals["anotherValue"].as_f64().unwrap_or_default()
        });

        assert_eq!(sum, 44.0);
    }

    #[test]
    fn apply_inside_digest_conflicts_and_leaves_phase() {
        let scope = Scope::new(ManualScheduler::new());
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        scope.watch(
            |_| Value::from(1),
            move |_, _, scope| {
                *slot.borrow_mut() = Some((scope.apply(|_| ()).err(), scope.phase()));
            },
        );

        scope.digest().unwrap();

        let (err, phase) = seen.borrow_mut().take().unwrap();
        assert_eq!(
            err,
            Some(ScopeError::PhaseConflict {
                active: Phase::Digest,
                requested: Phase::Apply,
            })
        );
        assert_eq!(phase, Some(Phase::Digest));
        assert_eq!(scope.phase(), None);
    }

    #[test]
    fn watch_ids_are_sequential() {
        let scope = Scope::new(ManualScheduler::new());
        let first = scope.watch_only(|_| Value::Null);
        let second =
            scope.watch_with(|_| Value::Null, |_, _, _| {}, ComparisonStrategy::Deep);

        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(scope.watcher_count(), 2);
    }
}
