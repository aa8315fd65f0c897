//! Provider scopes. A broker becomes visible to a subtree of calls the way
//! composition locals do: a thread-local stack of type-keyed frames, pushed
//! for the duration of a closure, resolved innermost-out.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

use strata_core::Broker;

use crate::error::ScopeError;

thread_local! {
    static BROKER_STACK: RefCell<Vec<HashMap<TypeId, Box<dyn Any>>>> = RefCell::new(Vec::new());
}

/// Makes `broker` visible to `f` and everything it calls on this thread.
/// Nesting shadows an outer broker of the same type for the inner frame.
pub fn with_broker<S, A, W, R>(broker: &Broker<S, A, W>, f: impl FnOnce() -> R) -> R
where
    S: 'static,
    A: 'static,
    W: 'static,
{
    // frame guard pops on unwind too
    struct Frame;
    impl Drop for Frame {
        fn drop(&mut self) {
            BROKER_STACK.with(|st| {
                st.borrow_mut().pop();
            });
        }
    }
    BROKER_STACK.with(|st| {
        let mut frame: HashMap<TypeId, Box<dyn Any>> = HashMap::new();
        frame.insert(
            TypeId::of::<Broker<S, A, W>>(),
            Box::new(broker.clone()),
        );
        st.borrow_mut().push(frame);
    });
    let _frame = Frame;
    f()
}

/// Innermost broker of the requested type, or a wiring error when no
/// provider is on the stack.
pub fn broker<S, A, W>() -> Result<Broker<S, A, W>, ScopeError>
where
    S: 'static,
    A: 'static,
    W: 'static,
{
    BROKER_STACK.with(|st| {
        for frame in st.borrow().iter().rev() {
            if let Some(v) = frame.get(&TypeId::of::<Broker<S, A, W>>())
                && let Some(b) = v.downcast_ref::<Broker<S, A, W>>()
            {
                return Ok(b.clone());
            }
        }
        Err(ScopeError::NoBrokerInScope {
            broker_type: std::any::type_name::<Broker<S, A, W>>(),
        })
    })
}
