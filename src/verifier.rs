// Verification invoker: the one place that asks a backend whether a held
// proof checks out. Kept apart from the lifecycle state machine so tests can
// swap in a stub without touching handle ownership.

use std::sync::Arc;

use crate::backend::{guarded, ProofHandle, ProvingBackend};
use crate::error::BackendError;

pub trait VerificationInvoker: Send {
    /// Ask for a fresh verdict on `handle`. Nothing is cached between calls.
    fn verify(&self, handle: &ProofHandle) -> Result<bool, BackendError>;
}

/// Delegates straight to the proving backend.
pub struct BackendVerifier {
    backend: Arc<dyn ProvingBackend>,
}

impl BackendVerifier {
    pub fn new(backend: Arc<dyn ProvingBackend>) -> Self {
        Self { backend }
    }
}

impl VerificationInvoker for BackendVerifier {
    fn verify(&self, handle: &ProofHandle) -> Result<bool, BackendError> {
        let raw = handle.raw();
        tracing::info!("Verifying proof handle {} on backend={}", raw, self.backend.name());
        let valid = guarded("verify", || self.backend.verify(raw))?;
        tracing::info!("Verification result for handle {}: {}", raw, valid);
        Ok(valid)
    }
}
