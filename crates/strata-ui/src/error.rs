use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScopeError {
    /// An access operation ran outside any provider. A wiring mistake in the
    /// tree, not a runtime condition — surface it, don't swallow it.
    #[error("no broker of type `{broker_type}` in scope; wrap the call in `with_broker`")]
    NoBrokerInScope { broker_type: &'static str },
}
