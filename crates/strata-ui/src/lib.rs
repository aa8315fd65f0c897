//! # Strata UI
//!
//! View-facing layer over `strata-core`: provider scopes plus the three
//! access patterns a component tree consumes.
//!
//! ```rust
//! use strata_core::Broker;
//! use strata_ui::{SliceHandle, use_slice, with_broker};
//!
//! let broker = Broker::new(0i64, |emit, prev: &i64, delta: i64| {
//!     emit.emit("value");
//!     prev + delta
//! });
//!
//! with_broker(&broker, || {
//!     let slice: SliceHandle<i64, i64> = use_slice(["value"], true).unwrap();
//!     broker.dispatch(5);
//!     assert_eq!(slice.state(), 5);
//! });
//! ```
//!
//! - [`use_slice`] — re-notified only for the subscribed identifiers.
//! - [`use_state`] — whole-state read, reactive to any transition.
//! - [`use_writer`] — dispatch surface only, stable across state-only
//!   transitions.
//!
//! All three fail with [`ScopeError::NoBrokerInScope`] outside a
//! [`with_broker`] provider.

pub mod error;
pub mod handles;
pub mod scope;

pub use error::*;
pub use handles::*;
pub use scope::*;
