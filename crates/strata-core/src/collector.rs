use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

type Pending = SmallVec<[String; 4]>;

/// Write-only handle the engine passes to state-producing logic for the
/// duration of one transition. Each `emit` marks a slice as touched.
#[derive(Clone)]
pub struct Emit(Rc<RefCell<Option<Pending>>>);

impl Emit {
    pub fn emit(&self, id: impl Into<String>) {
        let id = id.into();
        match &mut *self.0.borrow_mut() {
            Some(pending) => pending.push(id),
            // a stashed clone outlived its transition
            None => log::warn!("emit(\"{id}\") after the transition returned; update dropped"),
        }
    }
}

/// Pending-update buffer for one transition cycle. The engine creates it,
/// hands out `Emit` clones, and closes it right after the producer returns.
pub(crate) struct UpdateCollector(Rc<RefCell<Option<Pending>>>);

impl UpdateCollector {
    pub(crate) fn new() -> Self {
        Self(Rc::new(RefCell::new(Some(SmallVec::new()))))
    }

    pub(crate) fn handle(&self) -> Emit {
        Emit(self.0.clone())
    }

    /// Closes the collector and returns the touched ids, deduplicated in
    /// first-emission order. Later `emit` calls hit the `None` arm above.
    pub(crate) fn close(self) -> Pending {
        let pending = self.0.borrow_mut().take().unwrap_or_default();
        let mut ids = Pending::new();
        for id in pending {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}
