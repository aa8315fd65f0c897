//! The three access patterns a view layer consumes, each a thin shell over
//! the broker: a local subscribed toggle and a last-seen cache, nothing more.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smallvec::SmallVec;
use strata_core::{Broker, Callback};

use crate::error::ScopeError;
use crate::scope;

type Ids = SmallVec<[String; 4]>;

/// Reactive slice subscription: re-notified only when a transition emits one
/// of this handle's identifiers. Dropping the handle unregisters.
pub struct SliceHandle<S, A, W = ()>
where
    S: Clone + 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    broker: Broker<S, A, W>,
    ids: Ids,
    cb: Callback<S>,
    seen: Rc<RefCell<S>>,
    subscribed: Cell<bool>,
}

/// Resolves the broker in scope and subscribes to `ids` when `subscribed`
/// starts out true.
pub fn use_slice<S, A, W, I>(ids: I, subscribed: bool) -> Result<SliceHandle<S, A, W>, ScopeError>
where
    S: Clone + 'static,
    A: 'static,
    W: PartialEq + 'static,
    I: IntoIterator,
    I::Item: Into<String>,
{
    Ok(SliceHandle::new(scope::broker()?, ids, subscribed))
}

impl<S, A, W> SliceHandle<S, A, W>
where
    S: Clone + 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    pub fn new<I>(broker: Broker<S, A, W>, ids: I, subscribed: bool) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ids: Ids = ids.into_iter().map(Into::into).collect();
        let seen = Rc::new(RefCell::new(broker.snapshot()));
        let cb: Callback<S> = {
            let seen = seen.clone();
            Rc::new(move |s: &S| *seen.borrow_mut() = s.clone())
        };
        let handle = Self {
            broker,
            ids,
            cb,
            seen,
            subscribed: Cell::new(false),
        };
        if subscribed {
            handle.set_subscribed(true);
        }
        handle
    }

    /// Latest state this handle was notified with (or bootstrapped with when
    /// it last subscribed).
    pub fn state(&self) -> S {
        self.seen.borrow().clone()
    }

    pub fn writer(&self) -> W
    where
        W: Clone,
    {
        self.broker.writer()
    }

    pub fn dispatch(&self, action: A) {
        self.broker.dispatch(action);
    }

    pub fn subscribed(&self) -> bool {
        self.subscribed.get()
    }

    /// Toggles the subscription. Turning it back on re-registers and
    /// re-bootstraps from the current snapshot, never a stale cache.
    pub fn set_subscribed(&self, on: bool) {
        if on == self.subscribed.get() {
            log::warn!("set_subscribed({on}): already in that state");
            return;
        }
        self.subscribed.set(on);
        if on {
            self.broker.subscribe(self.ids.iter().cloned(), self.cb.clone());
        } else {
            self.broker.unsubscribe(self.ids.iter(), &self.cb);
        }
    }
}

impl<S, A, W> Drop for SliceHandle<S, A, W>
where
    S: Clone + 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    fn drop(&mut self) {
        if self.subscribed.get() {
            self.broker.unsubscribe(self.ids.iter(), &self.cb);
        }
    }
}

/// Whole-state reader. Deliberately coarse: every committed transition counts
/// as a change, whatever it emitted.
pub struct StateHandle<S, A, W = ()>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    broker: Broker<S, A, W>,
    seen_version: Cell<u64>,
}

pub fn use_state<S, A, W>() -> Result<StateHandle<S, A, W>, ScopeError>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    Ok(StateHandle::new(scope::broker()?))
}

impl<S, A, W> StateHandle<S, A, W>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    pub fn new(broker: Broker<S, A, W>) -> Self {
        let seen_version = Cell::new(broker.state_version());
        Self {
            broker,
            seen_version,
        }
    }

    /// Latest committed snapshot; marks it seen.
    pub fn get(&self) -> S
    where
        S: Clone,
    {
        self.seen_version.set(self.broker.state_version());
        self.broker.snapshot()
    }

    pub fn writer(&self) -> W
    where
        W: Clone,
    {
        self.broker.writer()
    }

    /// True when a transition committed since the last `get`.
    pub fn changed(&self) -> bool {
        self.broker.state_version() != self.seen_version.get()
    }

    pub fn version(&self) -> u64 {
        self.broker.state_version()
    }
}

/// Write-only access: the dispatch surface and the writer facet. Its version
/// moves only when the writer's field values changed, never on state-only
/// transitions.
pub struct WriterHandle<S, A, W = ()>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    broker: Broker<S, A, W>,
    seen_version: Cell<u64>,
}

pub fn use_writer<S, A, W>() -> Result<WriterHandle<S, A, W>, ScopeError>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    Ok(WriterHandle::new(scope::broker()?))
}

impl<S, A, W> WriterHandle<S, A, W>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    pub fn new(broker: Broker<S, A, W>) -> Self {
        let seen_version = Cell::new(broker.writer_version());
        Self {
            broker,
            seen_version,
        }
    }

    pub fn dispatch(&self, action: A) {
        self.broker.dispatch(action);
    }

    /// Current writer value; marks it seen.
    pub fn writer(&self) -> W
    where
        W: Clone,
    {
        self.seen_version.set(self.broker.writer_version());
        self.broker.writer()
    }

    /// True when the writer's value changed since the last `writer` read.
    pub fn changed(&self) -> bool {
        self.broker.writer_version() != self.seen_version.get()
    }

    pub fn version(&self) -> u64 {
        self.broker.writer_version()
    }
}
