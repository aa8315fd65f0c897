use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type Callback<S> = Rc<dyn Fn(&S)>;

/// Identifier → ordered callbacks registered under it. Removal is by pointer
/// identity, never value comparison; callbacks are behaviorally distinct even
/// when structurally similar.
pub struct SubscriptionRegistry<S> {
    subs: RefCell<HashMap<String, Vec<Callback<S>>>>,
}

impl<S> SubscriptionRegistry<S> {
    pub fn new() -> Self {
        Self {
            subs: RefCell::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: impl Into<String>, cb: Callback<S>) {
        self.subs.borrow_mut().entry(id.into()).or_default().push(cb);
    }

    /// Removes the first occurrence of `cb` under `id`. No-op when absent,
    /// so redundant unregistration is harmless.
    pub fn remove(&self, id: &str, cb: &Callback<S>) {
        let mut subs = self.subs.borrow_mut();
        if let Some(list) = subs.get_mut(id) {
            if let Some(pos) = list.iter().position(|c| Rc::ptr_eq(c, cb)) {
                list.remove(pos);
            }
            if list.is_empty() {
                subs.remove(id);
            }
        }
    }

    /// Invokes every callback registered for `id` at the start of the pass,
    /// in registration order. Iterates a snapshot of the list: callbacks may
    /// register or unregister (themselves included) mid-pass; removals take
    /// effect from the next pass on.
    pub fn notify(&self, id: &str, state: &S) {
        let run: Vec<Callback<S>> = match self.subs.borrow().get(id) {
            Some(list) => list.clone(),
            None => return,
        };
        for cb in run {
            cb(state);
        }
    }

    /// Number of callbacks currently registered under `id`.
    pub fn count(&self, id: &str) -> usize {
        self.subs.borrow().get(id).map_or(0, Vec::len)
    }
}

impl<S> Default for SubscriptionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
