//! # Strata core
//!
//! An in-process publish/subscribe fabric for component-tree state. One
//! broker owns the whole state value; consumers subscribe to string
//! identifiers naming the slices they care about, and a transition notifies
//! only the callbacks registered under the identifiers it emitted.
//!
//! ## Broker
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strata_core::{Broker, Callback};
//!
//! let broker = Broker::new(0i64, |emit, prev: &i64, delta: i64| {
//!     emit.emit("value");
//!     prev + delta
//! });
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let cb: Callback<i64> = {
//!     let seen = seen.clone();
//!     Rc::new(move |s: &i64| seen.borrow_mut().push(*s))
//! };
//!
//! // subscribing bootstraps synchronously with the current snapshot
//! broker.subscribe(["value"], cb.clone());
//! broker.dispatch(5);
//! assert_eq!(*seen.borrow(), vec![0, 5]);
//! ```
//!
//! Emitting the same identifier several times in one transition notifies each
//! subscriber once; a transition that emits nothing still commits (late
//! subscribers bootstrap from the fresh snapshot) but runs no notify pass.
//!
//! ## Variants
//!
//! - [`Subscription`] — the degenerate single-writer shape: no action type,
//!   no writer facet, the producing closure passed per `update` call.
//! - [`sync::SharedSubscription`] — the same contract for multi-threaded
//!   hosts, with mutex-serialized transitions.
//!
//! The view-facing layer (slice/whole-state/write-only handles and the
//! provider scope) lives in `strata-ui`.

pub mod broker;
pub mod collector;
pub mod cow;
pub mod registry;
pub mod subscription;
pub mod sync;
pub mod tests;

pub use broker::*;
pub use collector::*;
pub use cow::*;
pub use registry::*;
pub use subscription::*;
