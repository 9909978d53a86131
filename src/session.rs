//! Background worker that owns the proof lifecycle.
//!
//! Backend calls block for as long as proving takes, so the lifecycle lives
//! on its own thread and is driven by commands sent through a bounded queue.
//! Exactly one command runs at a time; anything arriving meanwhile waits in
//! the queue and runs in arrival order. A running backend call is never
//! cancelled: a second `generate` waits for the first to finish, then
//! releases its proof and starts over.
//!
//! Status events are broadcast before the command's reply is sent. The
//! current `ProofState` and a busy flag are published on `watch` channels,
//! so reading them never waits behind a running backend call.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::backend::ProvingBackend;
use crate::claim::{self, DepositClaim};
use crate::error::LifecycleError;
use crate::lifecycle::{ProofLifecycle, ProofState, StatusEvent};

const EVENT_CAPACITY: usize = 256;

enum Command {
    Generate {
        claim: DepositClaim,
        reply: oneshot::Sender<Result<(), LifecycleError>>,
    },
    Verify {
        reply: oneshot::Sender<Result<bool, LifecycleError>>,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable front door to the proof worker.
///
/// When the last handle is dropped the worker stops and releases any
/// proof it still holds.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<StatusEvent>,
    state: watch::Receiver<ProofState>,
    busy: watch::Receiver<bool>,
    backend_name: &'static str,
}

/// Start the worker thread for `backend`.
pub fn spawn_session(
    backend: Arc<dyn ProvingBackend>,
    queue_depth: usize,
) -> std::io::Result<SessionHandle> {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    let (commands, rx) = mpsc::channel(queue_depth.max(1));
    let backend_name = backend.name();
    let lifecycle = ProofLifecycle::new(backend, events.clone());
    let state = lifecycle.watch_state();
    let (busy_tx, busy) = watch::channel(false);

    std::thread::Builder::new()
        .name("proof-worker".to_string())
        .spawn(move || run_worker(lifecycle, rx, busy_tx))?;

    tracing::info!(
        "Proof session started: backend={} queue_depth={}",
        backend_name,
        queue_depth.max(1)
    );

    Ok(SessionHandle {
        commands,
        events,
        state,
        busy,
        backend_name,
    })
}

fn run_worker(
    mut lifecycle: ProofLifecycle,
    mut commands: mpsc::Receiver<Command>,
    busy: watch::Sender<bool>,
) {
    while let Some(command) = commands.blocking_recv() {
        match command {
            Command::Generate { claim, reply } => {
                busy.send_replace(true);
                let result = lifecycle.generate(&claim).map_err(LifecycleError::from);
                busy.send_replace(false);
                let _ = reply.send(result);
            }
            Command::Verify { reply } => {
                busy.send_replace(true);
                let result = lifecycle.verify();
                busy.send_replace(false);
                let _ = reply.send(result);
            }
            Command::Release { reply } => {
                busy.send_replace(true);
                lifecycle.release();
                busy.send_replace(false);
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                tracing::info!("Proof session shutting down");
                lifecycle.release();
                commands.close();
                let _ = reply.send(());
                break;
            }
        }
    }
    tracing::info!("Proof worker stopped");
}

impl SessionHandle {
    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Subscribe to status events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    /// Validate the raw form fields and, if they pass, generate a proof.
    /// Invalid input never reaches the worker.
    pub async fn submit(
        &self,
        amount_text: &str,
        term_text: &str,
        hash_text: &str,
    ) -> Result<(), LifecycleError> {
        let claim = claim::validate(amount_text, term_text, hash_text).map_err(|e| {
            tracing::warn!("Rejected deposit input: {}", e);
            e
        })?;
        self.generate(claim).await
    }

    pub async fn generate(&self, claim: DepositClaim) -> Result<(), LifecycleError> {
        self.request(|reply| Command::Generate { claim, reply }).await?
    }

    pub async fn verify(&self) -> Result<bool, LifecycleError> {
        self.request(|reply| Command::Verify { reply }).await?
    }

    pub async fn release(&self) -> Result<(), LifecycleError> {
        self.request(|reply| Command::Release { reply }).await
    }

    /// Latest published state. Does not queue behind the worker.
    pub fn state(&self) -> ProofState {
        self.state.borrow().clone()
    }

    /// Whether a backend call is running right now.
    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    /// Release any held proof and stop the worker. Later commands fail with
    /// `SessionClosed`; shutting down twice is harmless.
    pub async fn shutdown(&self) {
        let _ = self.request(|reply| Command::Shutdown { reply }).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, LifecycleError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| LifecycleError::SessionClosed)?;
        rx.await.map_err(|_| LifecycleError::SessionClosed)
    }
}
