//! # kivnc-core
//!
//! Server-side engine for kivnc, a minimal remote-screen viewer. A
//! viewer opens two TCP connections: it receives screen frames on the
//! data connection and sends pointer/keyboard intent on the control
//! connection, which the server replays as local input.
//!
//! This crate contains:
//! - **Codec**: `FrameCodec`, 4-byte length-prefixed framing for both connections
//! - **Protocol**: `Frame`, `ControlMessage` and their versioned MessagePack schema
//! - **Capture**: `ScreenSource`, the shared `CaptureSlot`, and `CaptureProducer`
//! - **State**: `SessionRegistry` (reference-counted producer lifecycle), `SessionPhase`
//! - **Session**: the per-viewer send-frame / read-control loop
//! - **Network**: `Acceptor` pairing connections by source address, `AllowList`
//! - **Input**: `InputReplayer` and the `InputInjector` seam (xdotool, recording mock)
//! - **Task**: `SessionPool` for tracking spawned sessions with cancellation
//! - **Error**: `Error` — typed, `thiserror`-based error hierarchy

pub mod capture;
pub mod codec;
pub mod error;
pub mod input;
pub mod network;
pub mod protocol;
pub mod session;
pub mod state;
pub mod task;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use capture::{
    CaptureConfig, CaptureProducer, CaptureSlot, CommandScreenSource, ScreenSource, Snapshot,
};
pub use codec::{FrameCodec, HEADER_LENGTH, read_frame, write_frame};
pub use error::{Error, Result};
pub use input::{InputAction, InputInjector, InputReplayer, RecordingInjector, XdotoolInjector};
pub use network::{Acceptor, AcceptorConfig, AllowList, PairRejection};
pub use protocol::{ControlMessage, Frame, FrameEnvelope, PROTOCOL_VERSION, PointerState, Position};
pub use session::{Session, SessionConfig};
pub use state::{SessionLease, SessionPhase, SessionRegistry};
pub use task::{SessionEvent, SessionId, SessionPool};
