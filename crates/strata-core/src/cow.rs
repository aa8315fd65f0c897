/// Structural-copy strategy injected into reducer-style brokers: given a base
/// state and a mutation, produce a fresh state without aliasing the base.
pub trait CopyStrategy<S> {
    fn apply(&self, base: &S, mutate: &mut dyn FnMut(&mut S)) -> S;
}

/// Default strategy: clone the base, mutate the clone. `Rc`/`Arc`-held
/// substructures stay shared until a deeper write clones them out, which
/// gives copy-on-write sharing for free on state shaped that way.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloneOnWrite;

impl<S: Clone> CopyStrategy<S> for CloneOnWrite {
    fn apply(&self, base: &S, mutate: &mut dyn FnMut(&mut S)) -> S {
        let mut next = base.clone();
        mutate(&mut next);
        next
    }
}
