use thiserror::Error;

pub use join_core::ConfigurationError;

/// Failure submitting a task to a [`crate::pool::ThreadPoolContract`].
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool is shutting down")]
    ShuttingDown,
}

/// Failures an emission (blocking or not) can raise synchronously.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("molecule {0} is not bound to any join definition")]
    NotBound(String),
    #[error("failed to submit the matched reaction: {0}")]
    PoolRejected(#[from] PoolError),
    /// A blocking emission observed a [`RuntimeProtocolError`]-class fault:
    /// the consuming reaction dropped the blocking molecule without
    /// replying.
    #[error("runtime protocol violation: {0}")]
    ProtocolFault(String),
}

/// Failures `JoinDefinition::activate` can raise. A failed activation
/// leaves no molecule bound.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("molecule {0} is already bound to another join definition")]
    AlreadyBound(String),
    #[error("{0}")]
    StaticAnalysis(String),
}
