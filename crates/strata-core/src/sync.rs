//! Multi-threaded hosting of the single-writer pattern. One mutex serializes
//! full transition cycles (commit through notify); callbacks run on the
//! updating thread, outside the state lock, against a cloned snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

pub type SharedCallback<S> = Arc<dyn Fn(&S) + Send + Sync>;

type Pending = SmallVec<[String; 4]>;

/// `emit` handle for [`SharedSubscription::update`] closures.
#[derive(Clone)]
pub struct SharedEmit(Arc<Mutex<Option<Pending>>>);

impl SharedEmit {
    pub fn emit(&self, id: impl Into<String>) {
        let id = id.into();
        match &mut *self.0.lock() {
            Some(pending) => pending.push(id),
            None => log::warn!("emit(\"{id}\") after the transition returned; update dropped"),
        }
    }
}

pub struct SharedSubscription<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    state: Mutex<S>,
    version: AtomicU64,
    registry: Mutex<HashMap<String, Vec<SharedCallback<S>>>>,
    // single-writer discipline: held for the whole cycle
    transition: Mutex<()>,
}

impl<S> Clone for SharedSubscription<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: Clone + Send + 'static> SharedSubscription<S> {
    pub fn new(initial: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(initial),
                version: AtomicU64::new(0),
                registry: Mutex::new(HashMap::new()),
                transition: Mutex::new(()),
            }),
        }
    }

    pub fn update(&self, produce: impl FnOnce(&SharedEmit, &S) -> S) {
        let _cycle = self.inner.transition.lock();

        let buffer = Arc::new(Mutex::new(Some(Pending::new())));
        let next = {
            let state = self.inner.state.lock();
            produce(&SharedEmit(buffer.clone()), &state)
        };
        let pending = buffer.lock().take().unwrap_or_default();

        let snapshot = {
            let mut state = self.inner.state.lock();
            *state = next;
            state.clone()
        };
        self.inner.version.fetch_add(1, Ordering::Release);

        let mut seen = Pending::new();
        for id in pending {
            if seen.contains(&id) {
                continue;
            }
            let run: Vec<SharedCallback<S>> = self
                .inner
                .registry
                .lock()
                .get(&id)
                .cloned()
                .unwrap_or_default();
            for cb in &run {
                cb(&snapshot);
            }
            seen.push(id);
        }
    }

    /// Register + synchronous bootstrap, like the single-threaded variants.
    pub fn subscribe<I>(&self, ids: I, cb: SharedCallback<S>)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        {
            let mut registry = self.inner.registry.lock();
            for id in ids {
                registry.entry(id.into()).or_default().push(cb.clone());
            }
        }
        let snapshot = self.inner.state.lock().clone();
        cb(&snapshot);
    }

    pub fn unsubscribe<I>(&self, ids: I, cb: &SharedCallback<S>)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut registry = self.inner.registry.lock();
        for id in ids {
            let id = id.as_ref();
            if let Some(list) = registry.get_mut(id) {
                if let Some(pos) = list.iter().position(|c| Arc::ptr_eq(c, cb)) {
                    list.remove(pos);
                }
                if list.is_empty() {
                    registry.remove(id);
                }
            }
        }
    }

    pub fn snapshot(&self) -> S {
        self.inner.state.lock().clone()
    }

    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }
}
