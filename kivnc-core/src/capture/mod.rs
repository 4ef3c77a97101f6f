//! Screen capture: the external source seam, the shared single-slot
//! store, and the background producer that refreshes it.
//!
//! ```text
//! ScreenSource ──capture/pointer──► CaptureProducer ──publish──► CaptureSlot
//!                                                                   │
//!                                          Session ◄──snapshot──────┤
//!                                          Session ◄──snapshot──────┘
//! ```

pub mod command;
pub mod producer;

use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use image::RgbImage;

use crate::error::Result;
use crate::protocol::{Frame, FrameEnvelope};

pub use command::CommandScreenSource;
pub use producer::{CaptureConfig, CaptureProducer};

// ── ScreenSource ─────────────────────────────────────────────────

/// The external screen-capture collaborator.
///
/// Both calls may block (they typically spawn a process), so the
/// producer runs them on the blocking pool.
pub trait ScreenSource: Send + Sync + 'static {
    /// Grab the full-resolution screen.
    fn capture(&self) -> Result<RgbImage>;

    /// Current pointer location in full-resolution pixels.
    fn pointer(&self) -> Result<(i32, i32)>;
}

// ── Snapshot ─────────────────────────────────────────────────────

/// A published frame together with its encoded wire payload.
#[derive(Debug)]
pub struct Snapshot {
    frame: Frame,
    payload: Bytes,
    sequence: u64,
}

impl Snapshot {
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Data-connection payload for this frame.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Publication counter, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

// ── CaptureSlot ──────────────────────────────────────────────────

/// Holds the most recent frame. One writer, any number of readers.
///
/// Publishing swaps a whole `Arc<Snapshot>` under the write lock, so a
/// reader holds either the old snapshot or the new one, never a mix.
#[derive(Debug, Clone, Default)]
pub struct CaptureSlot {
    inner: Arc<RwLock<Option<Arc<Snapshot>>>>,
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame. Encoding happens before the lock is
    /// taken so readers are never held up by serialisation.
    pub fn publish(&self, frame: Frame) -> Result<u64> {
        let payload = frame.encode()?;
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = slot.as_ref().map_or(1, |s| s.sequence + 1);
        *slot = Some(Arc::new(Snapshot {
            frame,
            payload,
            sequence,
        }));
        Ok(sequence)
    }

    /// The latest snapshot, if anything was ever published.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Payload to send right now: the latest frame, or the empty
    /// sentinel before the first publication.
    pub fn payload(&self) -> Result<Bytes> {
        match self.snapshot() {
            Some(snapshot) => Ok(snapshot.payload.clone()),
            None => FrameEnvelope::empty_payload(),
        }
    }
}
