//! Binding to the external deposit-proof library (`libwinterfell_ffi`).
//!
//! The library hands out opaque `StarkProof` pointers. A null pointer from
//! `generate_deposit_proof` means generation failed. Every non-null pointer
//! must go back through `release_proof` exactly once, which the session's
//! `ProofHandle` guarantees. Linking is set up by `build.rs`.

use crate::backend::{ProvingBackend, RawHandle};
use crate::claim::DepositClaim;

#[repr(C)]
pub struct StarkProof {
    _private: [u8; 0],
}

extern "C" {
    fn generate_deposit_proof(
        amount: u64,
        term: u32,
        tx_hash: *const u8,
        hash_len: usize,
    ) -> *mut StarkProof;
    fn verify_deposit_proof(proof: *const StarkProof) -> bool;
    fn release_proof(proof: *mut StarkProof);
}

pub struct NativeBackend;

impl ProvingBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    fn generate(&self, claim: &DepositClaim) -> Option<RawHandle> {
        let tx_hash = claim.tx_hash();
        // SAFETY: the pointer/length pair describes a live slice for the
        // duration of the call; the library does not retain it.
        let proof = unsafe {
            generate_deposit_proof(
                claim.amount(),
                claim.term_days(),
                tx_hash.as_ptr(),
                tx_hash.len(),
            )
        };
        RawHandle::new(proof as usize)
    }

    fn verify(&self, handle: RawHandle) -> bool {
        // SAFETY: `handle` came from `generate_deposit_proof` and has not been
        // released; `ProofHandle` only releases on drop.
        unsafe { verify_deposit_proof(handle.get() as *const StarkProof) }
    }

    fn release(&self, handle: RawHandle) {
        // SAFETY: called once per handle, from `ProofHandle::drop`.
        unsafe { release_proof(handle.get() as *mut StarkProof) }
    }
}
