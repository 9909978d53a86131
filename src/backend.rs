use std::any::Any;
use std::fmt;
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::claim::DepositClaim;
use crate::error::BackendError;

/// Backend-issued proof identifier. Never null: a null result from the
/// backend is a generation failure and never becomes a `RawHandle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(NonZeroUsize);

impl RawHandle {
    pub fn new(value: usize) -> Option<Self> {
        NonZeroUsize::new(value).map(Self)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.get())
    }
}

/// The external STARK proving service.
///
/// Calls are blocking and may take a long time; they are only ever made from
/// the session worker thread, one at a time.
pub trait ProvingBackend: Send + Sync + 'static {
    /// Short name for logs and the health endpoint.
    fn name(&self) -> &'static str;

    /// `None` means the backend could not produce a proof.
    fn generate(&self, claim: &DepositClaim) -> Option<RawHandle>;

    fn verify(&self, handle: RawHandle) -> bool;

    /// Free backend-held proof data. Called exactly once per issued handle,
    /// and only through [`ProofHandle`]'s destructor.
    fn release(&self, handle: RawHandle);
}

/// Sole owner of a live backend proof.
///
/// Not `Clone`/`Copy`. Dropping it releases the proof through the backend
/// that issued it, so a handle can be neither leaked nor freed twice.
pub struct ProofHandle {
    raw: RawHandle,
    backend: Arc<dyn ProvingBackend>,
}

impl ProofHandle {
    pub(crate) fn adopt(raw: RawHandle, backend: Arc<dyn ProvingBackend>) -> Self {
        tracing::debug!("Adopted proof handle {} from backend={}", raw, backend.name());
        Self { raw, backend }
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }
}

impl fmt::Debug for ProofHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofHandle")
            .field("raw", &self.raw)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Drop for ProofHandle {
    fn drop(&mut self) {
        let raw = self.raw;
        let backend = &self.backend;
        tracing::debug!("Releasing proof handle {} on backend={}", raw, backend.name());
        if let Err(e) = guarded("release", || backend.release(raw)) {
            // The handle is gone either way; there is nothing left to retry.
            tracing::error!("Release of proof handle {} failed: {}", raw, e);
        }
    }
}

/// Run a backend call, turning a panic into [`BackendError::Fault`].
pub(crate) fn guarded<T>(op: &str, call: impl FnOnce() -> T) -> Result<T, BackendError> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        tracing::error!("Backend panicked during {}: {}", op, message);
        BackendError::Fault(format!("{} panicked: {}", op, message))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
