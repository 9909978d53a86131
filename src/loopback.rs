use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::backend::{ProvingBackend, RawHandle};
use crate::claim::DepositClaim;

/// In-process backend for running the service without the native library.
///
/// It issues numbered handles instead of STARK proofs and reports a handle
/// as valid while it is live. Claims below `min_deposit` are refused the same
/// way the native prover refuses them: with a null handle.
pub struct LoopbackBackend {
    min_deposit: u64,
    next_id: AtomicUsize,
    live: Mutex<HashSet<RawHandle>>,
}

impl LoopbackBackend {
    pub fn new(min_deposit: u64) -> Self {
        Self {
            min_deposit,
            next_id: AtomicUsize::new(1),
            live: Mutex::new(HashSet::new()),
        }
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

impl ProvingBackend for LoopbackBackend {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn generate(&self, claim: &DepositClaim) -> Option<RawHandle> {
        if claim.amount() < self.min_deposit {
            tracing::warn!(
                "Loopback backend refused amount={} (minimum {})",
                claim.amount(),
                self.min_deposit
            );
            return None;
        }
        let raw = RawHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed))?;
        let mut live = self.live.lock().ok()?;
        live.insert(raw);
        Some(raw)
    }

    fn verify(&self, handle: RawHandle) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(&handle))
            .unwrap_or(false)
    }

    fn release(&self, handle: RawHandle) {
        let removed = self
            .live
            .lock()
            .map(|mut live| live.remove(&handle))
            .unwrap_or(false);
        if !removed {
            tracing::warn!("Loopback backend asked to release unknown handle {}", handle);
        }
    }
}
