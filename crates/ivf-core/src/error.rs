/// Error kinds surfaced by the IVF core: invariant violations fail
/// loudly, unsupported operations name the collaborator that doesn't
/// implement them, cancellation is reported once after a parallel
/// region drains, and capacity/state errors reject illegal mutations.
#[derive(Debug, thiserror::Error)]
pub enum IvfError {
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("computation interrupted")]
    Interrupted,

    #[error("capacity or state error: {0}")]
    CapacityState(String),
}

pub type IvfResult<T> = Result<T, IvfError>;

impl IvfError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        IvfError::InvariantViolation(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        IvfError::Unsupported(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        IvfError::CapacityState(msg.into())
    }
}
