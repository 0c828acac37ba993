//! Adapter lifecycle tracking.
//!
//! The state lives in a `watch` channel so the run loop, handlers, and tests can
//! all observe transitions. In-flight dispatches are counted separately so that
//! draining can wait for them to finish.
//!
//! ```text
//! Idle -> AwaitingRequest <-> Dispatching
//!                 \              /
//!                  -> Draining -> Terminated
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;

/// Where an adapter is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    /// Constructed, transport not yet open
    Idle,
    /// Handshake done, no call running
    AwaitingRequest,
    /// At least one tool call running
    Dispatching,
    /// Cancelled; waiting for in-flight calls to finish
    Draining,
    /// Transport closed
    Terminated,
}

/// Shared lifecycle state for one adapter instance.
#[derive(Debug)]
pub struct Lifecycle {
    state_tx: watch::Sender<AdapterState>,
    in_flight: AtomicUsize,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(AdapterState::Idle);
        Self {
            state_tx,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> AdapterState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AdapterState> {
        self.state_tx.subscribe()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Transport is open and ready for requests.
    pub fn mark_ready(&self) {
        self.state_tx.send_modify(|state| {
            if *state == AdapterState::Idle {
                *state = AdapterState::AwaitingRequest;
            }
        });
    }

    /// Register a running dispatch. The returned guard ends it on drop, so a
    /// panicking handler still releases its slot. Returns `None` once draining
    /// has begun.
    pub fn begin_dispatch(self: &Arc<Self>) -> Option<DispatchGuard> {
        let mut accepted = false;
        // The count moves under the channel lock so begin_drain cannot slip in between
        self.state_tx.send_if_modified(|state| match *state {
            AdapterState::Draining | AdapterState::Terminated => false,
            AdapterState::AwaitingRequest => {
                accepted = true;
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                *state = AdapterState::Dispatching;
                true
            }
            AdapterState::Idle | AdapterState::Dispatching => {
                accepted = true;
                self.in_flight.fetch_add(1, Ordering::SeqCst);
                false
            }
        });
        accepted.then(|| DispatchGuard {
            lifecycle: Arc::clone(self),
        })
    }

    fn end_dispatch(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        // send_modify always notifies, which wakes drained() even while Draining
        self.state_tx.send_modify(|state| {
            if remaining == 0 && *state == AdapterState::Dispatching {
                *state = AdapterState::AwaitingRequest;
            }
        });
    }

    /// Refuse new dispatches. Idempotent; a terminated adapter stays terminated.
    pub fn begin_drain(&self) {
        self.state_tx.send_modify(|state| {
            if *state != AdapterState::Terminated {
                *state = AdapterState::Draining;
            }
        });
    }

    /// Wait until no dispatch is in flight. Returns false if `timeout` elapsed first.
    pub async fn drained(&self, timeout: Duration) -> bool {
        let mut rx = self.subscribe();
        let wait = async {
            while self.in_flight() > 0 {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => self.in_flight() == 0,
            Err(_) => {
                tracing::warn!(
                    in_flight = self.in_flight(),
                    timeout_ms = timeout.as_millis() as u64,
                    "drain timed out with calls still running"
                );
                false
            }
        }
    }

    pub fn terminate(&self) {
        self.state_tx.send_replace(AdapterState::Terminated);
    }
}

/// Marks one dispatch as running for as long as it is alive.
#[derive(Debug)]
pub struct DispatchGuard {
    lifecycle: Arc<Lifecycle>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.lifecycle.end_dispatch();
    }
}
