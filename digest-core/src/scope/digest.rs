//! Digest Loop
//!
//! The digest drives a scope to a fixed point: it keeps re-evaluating every
//! watcher until a full pass finds nothing dirty and no immediate tasks are
//! queued.
//!
//! # Algorithm
//!
//! 1. Enter the digest phase and reset the `last_dirty` cursor.
//! 2. If an apply-async flush is scheduled, cancel it and flush now.
//! 3. Repeat:
//!    a. Drain the immediate task queue completely.
//!    b. Run one pass over the watchers (`digest_once`).
//!    c. If the pass was dirty or tasks are queued, spend one unit of the
//!       iteration budget, failing when none is left.
//!
//! # Short-Circuiting
//!
//! Within a pass, a clean watcher that is also the `last_dirty` cursor ends
//! the pass early. Every watcher has been re-checked since the last change
//! was seen, so the remainder of the list cannot be dirty. Near a fixed
//! point this turns the final confirming lap into a partial one.

use super::phase::Phase;
use super::watcher::Check;
use super::Scope;
use crate::error::{ScopeError, ScopeResult};

impl Scope {
    /// Run one ordered pass over the watchers.
    ///
    /// Returns `true` if any watcher was dirty.
    pub fn digest_once(&self) -> bool {
        let mut dirty = false;
        let mut index = 0;

        loop {
            let (id, watch_fn) = {
                let state = self.inner.state.borrow();
                match (state.watchers.id_at(index), state.watchers.watch_fn(index)) {
                    (Some(id), Some(watch_fn)) => (id, watch_fn),
                    _ => break,
                }
            };

            let new_value = watch_fn(self);
            let check = self.inner.state.borrow_mut().watchers.check(id, &new_value);

            match check {
                Check::Dirty {
                    listener_fn,
                    old_value,
                } => {
                    tracing::trace!(watcher = id.index(), ?new_value, ?old_value, "watcher dirty");
                    listener_fn(&new_value, &old_value, self);
                    dirty = true;
                }
                Check::Settled => {
                    tracing::trace!(watcher = id.index(), "pass settled early");
                    break;
                }
                Check::Clean => {}
            }

            index += 1;
        }

        dirty
    }

    /// Evaluate watchers until the scope is stable.
    ///
    /// Fails with [`ScopeError::PhaseConflict`] if another digest or apply
    /// owns the scope, and with [`ScopeError::IterationLimitExceeded`] if
    /// the watchers have not converged within the configured budget.
    /// Listener side effects from passes before a failure are kept.
    pub fn digest(&self) -> ScopeResult<()> {
        let ttl = self.inner.config.ttl;
        let mut budget = ttl;
        let mut passes = 0u32;

        let _phase = self.begin_phase(Phase::Digest)?;
        self.inner.state.borrow_mut().watchers.reset_last_dirty();

        let scheduled_flush = self.inner.state.borrow().apply_async.handle;
        if let Some(handle) = scheduled_flush {
            self.inner.scheduler.cancel(handle);
            self.flush_apply_async();
        }

        loop {
            self.drain_async_queue();
            let dirty = self.digest_once();
            passes += 1;

            let pending = self.has_pending_async();
            if !dirty && !pending {
                break;
            }
            if budget == 0 {
                let last_dirty = self.inner.state.borrow().watchers.last_dirty();
                tracing::warn!(
                    ttl,
                    passes,
                    pending,
                    last_dirty = ?last_dirty.map(|id| id.index()),
                    "digest did not converge"
                );
                return Err(ScopeError::IterationLimitExceeded { ttl });
            }
            budget -= 1;
        }

        tracing::debug!(passes, "digest complete");
        Ok(())
    }
}
