//! Digest Core
//!
//! This crate provides a dirty-checking change-propagation engine. It
//! implements:
//!
//! - Scopes holding arbitrary observed state
//! - Watchers pairing an observation with a reaction
//! - A digest loop that re-evaluates watchers until the state is stable
//! - Two tiers of deferred work: immediate tasks and coalesced applies
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The opaque observed value and its equality/copy utilities
//! - `scope`: Scopes, watchers, phases, queues and the digest loop
//! - `scheduler`: The injected "run this later" capability
//! - `config`: Digest tunables
//! - `error`: Errors raised by top-level scope operations
//!
//! Everything is single-threaded. "Asynchronous" work is deferred onto the
//! host's event loop through a [`Scheduler`], never run in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use digest_core::{ManualScheduler, Scope, Value};
//!
//! let scope = Scope::new(ManualScheduler::new());
//! scope.set("name", "Deepak");
//!
//! // Derive a value whenever the watched one changes
//! scope.watch(
//!     |scope| scope.get("name"),
//!     |new_value, _old_value, scope| {
//!         if let Some(name) = new_value.as_str() {
//!             scope.set("nameUpper", name.to_uppercase());
//!         }
//!     },
//! );
//!
//! scope.digest()?;
//! assert_eq!(scope.get("nameUpper"), Value::from("DEEPAK"));
//! ```

pub mod config;
pub mod error;
pub mod scheduler;
pub mod scope;
pub mod value;

pub use config::DigestConfig;
pub use error::{ScopeError, ScopeResult};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use scope::{ComparisonStrategy, Locals, Phase, Scope, WatchId};
pub use value::Value;
