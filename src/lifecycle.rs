use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};

use crate::backend::{guarded, ProofHandle, ProvingBackend};
use crate::claim::DepositClaim;
use crate::error::{BackendError, LifecycleError, StateError};
use crate::verifier::{BackendVerifier, VerificationInvoker};

pub const MSG_GENERATING: &str = "Generating proof...";
pub const MSG_GENERATED: &str = "Proof generated successfully.";
pub const MSG_VALID: &str = "Proof is valid.";
pub const MSG_INVALID: &str = "Proof is invalid.";
pub const MSG_RELEASED: &str = "Proof released.";

/// Observable proof state, read by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "camelCase")]
pub enum ProofState {
    Empty,
    Generated,
    Verified(bool),
    Failed(String),
}

impl ProofState {
    /// Whether a proof is held, i.e. whether Verify should be enabled.
    pub fn has_proof(&self) -> bool {
        matches!(self, ProofState::Generated | ProofState::Verified(_))
    }
}

/// Event published on every transition, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatusEvent {
    Status { message: String },
    HandleAvailable { available: bool },
    GenerationResult { success: bool, message: String },
    VerificationResult { valid: bool, message: String },
}

/// Internal state. The handle lives inside the variants that may hold one,
/// so "handle present iff Generated or Verified" cannot be violated.
#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Generated(ProofHandle),
    Verified(ProofHandle, bool),
    Failed(BackendError),
}

/// Owner of the single live proof and the state machine around it.
///
/// Transitions:
/// - `generate`: release any held proof, then ask the backend for a new one.
///   Null or fault ends in `Failed`; success in `Generated`.
/// - `verify`: only with a held proof; always re-asks the backend.
/// - `release`: drops the held proof; a no-op when there is none.
///
/// `Failed` holds no proof and behaves like `Empty` for the next command.
/// It is also entered from `Verified` when the backend faults during a
/// repeat verify: the proof is given up either way.
///
/// Every transition is published on a `watch` channel so readers never have
/// to wait for a running backend call.
pub struct ProofLifecycle {
    backend: Arc<dyn ProvingBackend>,
    verifier: Box<dyn VerificationInvoker>,
    slot: Slot,
    events: broadcast::Sender<StatusEvent>,
    state_tx: watch::Sender<ProofState>,
}

impl ProofLifecycle {
    pub fn new(backend: Arc<dyn ProvingBackend>, events: broadcast::Sender<StatusEvent>) -> Self {
        let verifier = Box::new(BackendVerifier::new(backend.clone()));
        Self::with_verifier(backend, verifier, events)
    }

    pub fn with_verifier(
        backend: Arc<dyn ProvingBackend>,
        verifier: Box<dyn VerificationInvoker>,
        events: broadcast::Sender<StatusEvent>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ProofState::Empty);
        Self {
            backend,
            verifier,
            slot: Slot::Empty,
            events,
            state_tx,
        }
    }

    /// Receiver that always holds the latest published state.
    pub fn watch_state(&self) -> watch::Receiver<ProofState> {
        self.state_tx.subscribe()
    }

    pub fn state(&self) -> ProofState {
        match &self.slot {
            Slot::Empty => ProofState::Empty,
            Slot::Generated(_) => ProofState::Generated,
            Slot::Verified(_, valid) => ProofState::Verified(*valid),
            Slot::Failed(reason) => ProofState::Failed(reason.to_string()),
        }
    }

    pub fn has_handle(&self) -> bool {
        matches!(self.slot, Slot::Generated(_) | Slot::Verified(..))
    }

    pub fn generate(&mut self, claim: &DepositClaim) -> Result<(), BackendError> {
        // Release before asking for a replacement: at most one live proof.
        self.drop_handle();
        self.publish();

        self.emit(StatusEvent::Status {
            message: MSG_GENERATING.to_string(),
        });
        tracing::info!(
            "Generating proof for amount={} term_days={} tx_hash_len={} backend={}",
            claim.amount(),
            claim.term_days(),
            claim.tx_hash().len(),
            self.backend.name()
        );

        let backend = &self.backend;
        let outcome = guarded("generate", || backend.generate(claim))
            .and_then(|raw| raw.ok_or(BackendError::GenerationFailed));

        match outcome {
            Ok(raw) => {
                tracing::info!("Proof generated: handle {}", raw);
                self.slot = Slot::Generated(ProofHandle::adopt(raw, self.backend.clone()));
                self.publish();
                self.emit(StatusEvent::GenerationResult {
                    success: true,
                    message: MSG_GENERATED.to_string(),
                });
                self.emit(StatusEvent::HandleAvailable { available: true });
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Proof generation failed: {}", err);
                self.slot = Slot::Failed(err.clone());
                self.publish();
                self.emit(StatusEvent::GenerationResult {
                    success: false,
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    pub fn verify(&mut self) -> Result<bool, LifecycleError> {
        let handle = match std::mem::take(&mut self.slot) {
            Slot::Generated(handle) | Slot::Verified(handle, _) => handle,
            other => {
                self.slot = other;
                let err = StateError::NoProofToVerify;
                tracing::warn!("Verify requested without a proof");
                self.emit(StatusEvent::Status {
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };

        match self.verifier.verify(&handle) {
            Ok(valid) => {
                self.slot = Slot::Verified(handle, valid);
                self.publish();
                let message = if valid { MSG_VALID } else { MSG_INVALID };
                self.emit(StatusEvent::VerificationResult {
                    valid,
                    message: message.to_string(),
                });
                Ok(valid)
            }
            Err(err) => {
                // A faulted backend's verdict on this proof is unknown; give it up.
                drop(handle);
                tracing::warn!("Verification failed: {}", err);
                self.slot = Slot::Failed(err.clone());
                self.publish();
                self.emit(StatusEvent::HandleAvailable { available: false });
                self.emit(StatusEvent::Status {
                    message: format!("Verification error: {}", err),
                });
                Err(err.into())
            }
        }
    }

    /// Release the held proof, if any. Calling it again is harmless.
    pub fn release(&mut self) {
        if self.drop_handle() {
            self.publish();
            self.emit(StatusEvent::Status {
                message: MSG_RELEASED.to_string(),
            });
        }
    }

    /// Returns whether a proof was actually released.
    fn drop_handle(&mut self) -> bool {
        match std::mem::take(&mut self.slot) {
            Slot::Generated(handle) | Slot::Verified(handle, _) => {
                tracing::info!("Releasing proof handle {}", handle.raw());
                drop(handle);
                self.emit(StatusEvent::HandleAvailable { available: false });
                true
            }
            // Failed carries no proof; keep reporting it until replaced.
            failed @ Slot::Failed(_) => {
                self.slot = failed;
                false
            }
            Slot::Empty => false,
        }
    }

    fn publish(&self) {
        // send_replace stores the value even with no receivers attached.
        self.state_tx.send_replace(self.state());
    }

    fn emit(&self, event: StatusEvent) {
        // No subscribers is fine; the state is still queryable.
        let _ = self.events.send(event);
    }
}

impl Drop for ProofLifecycle {
    fn drop(&mut self) {
        if self.has_handle() {
            tracing::info!("Session ending; releasing held proof");
        }
    }
}
