use thiserror::Error;

/// Rejected form input. Raised before the backend is ever touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Invalid deposit amount: expected a whole number between 0 and {}", u64::MAX)]
    InvalidAmount,
    #[error("Invalid term: expected a whole number of days between 0 and {}", u32::MAX)]
    InvalidTerm,
    #[error("Invalid transaction hash: expected a non-empty, even-length hex string")]
    InvalidHash,
}

/// Failure reported by (or caught around) the proving backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Failed to generate proof.")]
    GenerationFailed,
    #[error("Proving backend fault: {0}")]
    Fault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("No proof generated to verify.")]
    NoProofToVerify,
}

/// Everything a lifecycle command can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("Proof session is no longer running")]
    SessionClosed,
}
