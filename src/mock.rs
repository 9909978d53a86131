//! Call-recording proving backend for tests.
//!
//! Every backend call is appended to a shared log so tests can assert the
//! exact generate/verify/release sequence. Results, delays and panics are
//! scriptable.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{ProvingBackend, RawHandle};
use crate::claim::DepositClaim;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Generate {
        amount: u64,
        term_days: u32,
        tx_hash: Vec<u8>,
    },
    Verify(RawHandle),
    Release(RawHandle),
}

/// Mock proving backend. Clones share state.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<BackendCall>,
    /// Scripted generate results; when empty, handles are numbered 1, 2, ...
    generate_results: VecDeque<Option<usize>>,
    next_handle: usize,
    verify_result: bool,
    live: HashSet<RawHandle>,
    stale_uses: usize,
    delay: Option<Duration>,
    in_flight: usize,
    max_in_flight: usize,
    panic_on_generate: bool,
    panic_on_verify: bool,
    panic_on_release: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().verify_result = true;
        mock
    }

    pub fn shared(&self) -> Arc<dyn ProvingBackend> {
        Arc::new(self.clone())
    }

    /// Queue the next generate result (`None` = null handle).
    pub fn push_generate_result(&self, result: Option<usize>) {
        self.state.lock().unwrap().generate_results.push_back(result);
    }

    pub fn set_verify_result(&self, valid: bool) {
        self.state.lock().unwrap().verify_result = valid;
    }

    /// Make every backend call sleep, to widen concurrency windows.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn panic_on_generate(&self, enabled: bool) {
        self.state.lock().unwrap().panic_on_generate = enabled;
    }

    pub fn panic_on_verify(&self, enabled: bool) {
        self.state.lock().unwrap().panic_on_verify = enabled;
    }

    pub fn panic_on_release(&self, enabled: bool) {
        self.state.lock().unwrap().panic_on_release = enabled;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn generate_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Generate { .. }))
    }

    pub fn verify_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Verify(_)))
    }

    pub fn release_count(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Release(_)))
    }

    /// Handles issued and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state.lock().unwrap().live.len()
    }

    /// Verify/release calls made with a handle that was not live.
    pub fn stale_uses(&self) -> usize {
        self.state.lock().unwrap().stale_uses
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| pred(c)).count()
    }

    /// Record a call and return (delay, should_panic) without holding the
    /// lock across the sleep or the panic.
    fn enter(
        &self,
        call: BackendCall,
        panic_flag: impl Fn(&MockState) -> bool,
    ) -> (Option<Duration>, bool) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.in_flight += 1;
        state.max_in_flight = state.max_in_flight.max(state.in_flight);
        (state.delay, panic_flag(&*state))
    }

    fn leave(&self) {
        self.state.lock().unwrap().in_flight -= 1;
    }

    fn pause(delay: Option<Duration>) {
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
    }
}

impl ProvingBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn generate(&self, claim: &DepositClaim) -> Option<RawHandle> {
        let (delay, should_panic) = self.enter(
            BackendCall::Generate {
                amount: claim.amount(),
                term_days: claim.term_days(),
                tx_hash: claim.tx_hash().to_vec(),
            },
            |s| s.panic_on_generate,
        );
        Self::pause(delay);
        if should_panic {
            self.leave();
            panic!("mock generate fault");
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        let value = match state.generate_results.pop_front() {
            Some(scripted) => scripted,
            None => {
                state.next_handle += 1;
                Some(state.next_handle)
            }
        };
        let raw = value.and_then(RawHandle::new);
        if let Some(raw) = raw {
            state.live.insert(raw);
        }
        raw
    }

    fn verify(&self, handle: RawHandle) -> bool {
        let (delay, should_panic) =
            self.enter(BackendCall::Verify(handle), |s| s.panic_on_verify);
        Self::pause(delay);
        if should_panic {
            self.leave();
            panic!("mock verify fault");
        }

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        if !state.live.contains(&handle) {
            state.stale_uses += 1;
        }
        state.verify_result
    }

    fn release(&self, handle: RawHandle) {
        let (delay, should_panic) =
            self.enter(BackendCall::Release(handle), |s| s.panic_on_release);
        Self::pause(delay);

        {
            let mut state = self.state.lock().unwrap();
            state.in_flight -= 1;
            if !state.live.remove(&handle) {
                state.stale_uses += 1;
            }
        }
        if should_panic {
            panic!("mock release fault");
        }
    }
}
