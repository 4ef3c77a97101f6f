//! Active-session counting and capture-producer activation.
//!
//! The registry owns the only handle to the running producer. The
//! 0→1 transition spawns a producer, 1→0 cancels it; both happen inside
//! the same short critical section as the count change, so
//! `producer_running == (active > 0)` holds whenever the lock is free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::capture::{CaptureProducer, CaptureSlot};

struct RunningProducer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct RegistryState {
    active: usize,
    running: Option<RunningProducer>,
    /// The last stopped producer; a restart waits for it to finish so two
    /// capture loops never overlap.
    retired: Option<JoinHandle<()>>,
}

/// Tracks live sessions and starts/stops the capture producer.
pub struct SessionRegistry {
    producer: CaptureProducer,
    state: Mutex<RegistryState>,
    starts: AtomicU64,
}

impl SessionRegistry {
    pub fn new(producer: CaptureProducer) -> Self {
        Self {
            producer,
            state: Mutex::new(RegistryState::default()),
            starts: AtomicU64::new(0),
        }
    }

    /// The slot sessions read frames from.
    pub fn slot(&self) -> &CaptureSlot {
        self.producer.slot()
    }

    /// Register a session. Starts the producer on 0→1.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn increment(&self) {
        let mut state = self.lock();
        state.active += 1;
        if state.active == 1 {
            self.start_producer(&mut state);
        }
    }

    /// Unregister a session. Stops the producer on 1→0.
    ///
    /// Calling this with no active sessions is a bug; it is logged and
    /// otherwise ignored.
    pub fn decrement(&self) {
        let mut state = self.lock();
        if state.active == 0 {
            error!("session registry decremented with no active sessions");
            return;
        }
        state.active -= 1;
        if state.active == 0 {
            if let Some(running) = state.running.take() {
                running.cancel.cancel();
                state.retired = Some(running.handle);
                info!("no active sessions; stopping capture producer");
            }
        }
    }

    /// Register a session and get a guard that unregisters it on drop.
    pub fn lease(self: &Arc<Self>) -> SessionLease {
        self.increment();
        SessionLease {
            registry: Arc::clone(self),
        }
    }

    pub fn active_count(&self) -> usize {
        self.lock().active
    }

    pub fn is_producer_running(&self) -> bool {
        self.lock().running.is_some()
    }

    /// How many producer instances have been launched so far.
    pub fn producer_starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    /// Stop the producer regardless of the session count and wait for
    /// it to exit. Used at server shutdown.
    pub async fn shutdown(&self) {
        let (running, retired) = {
            let mut state = self.lock();
            (state.running.take(), state.retired.take())
        };
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.handle.await;
        }
        if let Some(handle) = retired {
            let _ = handle.await;
        }
    }

    // ── Internal ─────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_producer(&self, state: &mut RegistryState) {
        if state.running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let previous = state.retired.take();
        let producer = self.producer.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            producer.run(token).await;
        });

        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        info!(start = n, "first session registered; starting capture producer");
        state.running = Some(RunningProducer { cancel, handle });
    }
}

// ── SessionLease ─────────────────────────────────────────────────

/// Keeps one session counted in the registry for as long as it lives.
#[must_use = "dropping the lease unregisters the session immediately"]
pub struct SessionLease {
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.registry.decrement();
    }
}

// ── Tests ────────────────────────────────────────────────────────
