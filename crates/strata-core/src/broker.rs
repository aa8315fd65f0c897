use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::collector::{Emit, UpdateCollector};
use crate::cow::CopyStrategy;
use crate::registry::{Callback, SubscriptionRegistry};

type Producer<S, A> = Box<dyn Fn(&Emit, &S, A) -> S>;

/// Raises the engine's busy flag for a lexical region, restoring the prior
/// value on unwind. Nested raises (subscribe during a notify pass) keep the
/// outer region's flag intact.
pub(crate) struct BusyGuard<'a> {
    flag: &'a Cell<bool>,
    prev: bool,
}

impl<'a> BusyGuard<'a> {
    pub(crate) fn raise(flag: &'a Cell<bool>) -> Self {
        Self {
            flag,
            prev: flag.replace(true),
        }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.prev);
    }
}

/// The broker: owns one state value, runs the state-producing logic per
/// dispatched action, and notifies only the subscribers registered under the
/// identifiers that transition emitted.
///
/// Cloning is cheap (shared handle); all clones address the same state and
/// registry. Single-threaded by construction — for multi-threaded hosting see
/// [`crate::sync`].
///
/// `W` is the writer facet: an auxiliary value derived from state after each
/// commit and compared by `PartialEq`, so consumers that only dispatch are
/// not re-run by state-only transitions. Brokers built with [`Broker::new`]
/// have no writer (`W = ()`).
pub struct Broker<S, A, W = ()> {
    inner: Rc<Inner<S, A, W>>,
}

struct Inner<S, A, W> {
    state: RefCell<S>,
    state_version: Cell<u64>,
    writer: RefCell<W>,
    writer_version: Cell<u64>,
    writer_of: Box<dyn Fn(&S) -> W>,
    produce: Producer<S, A>,
    registry: SubscriptionRegistry<S>,
    in_transition: Cell<bool>,
}

impl<S, A, W> std::fmt::Debug for Broker<S, A, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker").finish_non_exhaustive()
    }
}

impl<S, A, W> Clone for Broker<S, A, W> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: 'static, A: 'static> Broker<S, A> {
    /// Broker without a writer facet.
    pub fn new(initial: S, produce: impl Fn(&Emit, &S, A) -> S + 'static) -> Self {
        Self::with_writer(initial, produce, |_| ())
    }
}

impl<S, A, W> Broker<S, A, W>
where
    S: 'static,
    A: 'static,
    W: PartialEq + 'static,
{
    pub fn with_writer(
        initial: S,
        produce: impl Fn(&Emit, &S, A) -> S + 'static,
        writer_of: impl Fn(&S) -> W + 'static,
    ) -> Self {
        let writer = writer_of(&initial);
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(initial),
                state_version: Cell::new(0),
                writer: RefCell::new(writer),
                writer_version: Cell::new(0),
                writer_of: Box::new(writer_of),
                produce: Box::new(produce),
                registry: SubscriptionRegistry::new(),
                in_transition: Cell::new(false),
            }),
        }
    }

    /// Reducer-style construction: `reduce` mutates a draft obtained from
    /// `strategy` instead of returning a fresh value.
    pub fn with_reducer<C>(
        initial: S,
        strategy: C,
        reduce: impl Fn(&mut S, A, &Emit) + 'static,
        writer_of: impl Fn(&S) -> W + 'static,
    ) -> Self
    where
        C: CopyStrategy<S> + 'static,
    {
        Self::with_writer(
            initial,
            move |emit, prev, action| {
                let mut action = Some(action);
                strategy.apply(prev, &mut |draft| {
                    if let Some(action) = action.take() {
                        reduce(draft, action, emit);
                    }
                })
            },
            writer_of,
        )
    }

    /// Runs one transition cycle: produce → commit → refresh writer → notify
    /// each emitted id once.
    ///
    /// A panic in the producer propagates and commits nothing; the prior
    /// snapshot stays authoritative. Dispatching again from inside the
    /// producer or a notification callback is a programmer error and panics.
    pub fn dispatch(&self, action: A) {
        if self.inner.in_transition.get() {
            panic!("strata: dispatch during an active transition");
        }
        let _busy = BusyGuard::raise(&self.inner.in_transition);

        let collector = UpdateCollector::new();
        let next = {
            let prev = self.inner.state.borrow();
            (self.inner.produce)(&collector.handle(), &prev, action)
        };
        let touched = collector.close();

        *self.inner.state.borrow_mut() = next;
        self.inner.state_version.set(self.inner.state_version.get() + 1);
        self.refresh_writer();

        log::trace!(
            "transition v{} touched {} id(s)",
            self.inner.state_version.get(),
            touched.len()
        );
        let state = self.inner.state.borrow();
        for id in &touched {
            self.inner.registry.notify(id, &state);
        }
    }

    fn refresh_writer(&self) {
        let next = {
            let state = self.inner.state.borrow();
            (self.inner.writer_of)(&state)
        };
        let mut writer = self.inner.writer.borrow_mut();
        if *writer != next {
            *writer = next;
            self.inner
                .writer_version
                .set(self.inner.writer_version.get() + 1);
        }
    }

    /// Registers `cb` under each id, then invokes it exactly once,
    /// synchronously, with the current snapshot — however many ids were
    /// passed. The same callback registered twice under one id is delivered
    /// twice; the registry does not deduplicate.
    ///
    /// The bootstrap call runs under the engine's busy flag: a callback that
    /// dispatches from inside its own bootstrap is reentrant and fails fast,
    /// like dispatching from a notification.
    pub fn subscribe<I>(&self, ids: I, cb: Callback<S>)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for id in ids {
            self.inner.registry.insert(id, cb.clone());
        }
        let _busy = BusyGuard::raise(&self.inner.in_transition);
        let state = self.inner.state.borrow();
        cb(&state);
    }

    /// Removes `cb` (by identity) from each id's list. Idempotent.
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

    /// Reads the committed snapshot without cloning it.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Bumps on every commit — the explicit "changed" signal for whole-state
    /// readers.
    pub fn state_version(&self) -> u64 {
        self.inner.state_version.get()
    }

    pub fn writer(&self) -> W
    where
        W: Clone,
    {
        self.inner.writer.borrow().clone()
    }

    /// Bumps only when the writer's value actually changed across a commit.
    pub fn writer_version(&self) -> u64 {
        self.inner.writer_version.get()
    }

    pub fn subscriber_count(&self, id: &str) -> usize {
        self.inner.registry.count(id)
    }
}
