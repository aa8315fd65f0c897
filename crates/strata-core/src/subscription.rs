use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::broker::BusyGuard;
use crate::collector::{Emit, UpdateCollector};
use crate::registry::{Callback, SubscriptionRegistry};

/// Degenerate broker for the single-writer case: no action type and no
/// writer facet; the producing closure is passed per [`update`] call instead
/// of at construction.
///
/// [`update`]: Subscription::update
pub struct Subscription<S> {
    inner: Rc<Inner<S>>,
}

struct Inner<S> {
    state: RefCell<S>,
    version: Cell<u64>,
    registry: SubscriptionRegistry<S>,
    updating: Cell<bool>,
}

impl<S> Clone for Subscription<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static> Subscription<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(initial),
                version: Cell::new(0),
                registry: SubscriptionRegistry::new(),
                updating: Cell::new(false),
            }),
        }
    }

    /// One transition cycle, same commit-then-notify discipline as the full
    /// broker.
    pub fn update(&self, produce: impl FnOnce(&Emit, &S) -> S) {
        if self.inner.updating.get() {
            panic!("strata: update during an active update");
        }
        let _busy = BusyGuard::raise(&self.inner.updating);

        let collector = UpdateCollector::new();
        let next = {
            let prev = self.inner.state.borrow();
            produce(&collector.handle(), &prev)
        };
        let touched = collector.close();

        *self.inner.state.borrow_mut() = next;
        self.inner.version.set(self.inner.version.get() + 1);

        let state = self.inner.state.borrow();
        for id in &touched {
            self.inner.registry.notify(id, &state);
        }
    }

    /// Register + synchronous bootstrap with the current snapshot. As with
    /// the full broker, a bootstrap callback that calls `update` is reentrant
    /// and fails fast.
    pub fn subscribe<I>(&self, ids: I, cb: Callback<S>)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for id in ids {
            self.inner.registry.insert(id, cb.clone());
        }
        let _busy = BusyGuard::raise(&self.inner.updating);
        let state = self.inner.state.borrow();
        cb(&state);
    }

    pub fn unsubscribe<I>(&self, ids: I, cb: &Callback<S>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for id in ids {
            self.inner.registry.remove(id.as_ref(), cb);
        }
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.inner.state.borrow().clone()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }
}
