//! Wire schema carried inside frames on both connections.
//!
//! Payloads are MessagePack maps (`rmp-serde`, named fields) so any
//! language with a MessagePack library can speak the protocol. Every
//! non-empty payload carries `v`, the protocol version.
//!
//! ## Data connection (server → client, once per session tick)
//! ```text
//! { v: 1, frame: nil }                                  no capture yet
//! { v: 1, frame: { width, height, channels: 3,
//!                  pixels: bin (RGB8, row-major),
//!                  pointer: { x, y, total_size: [w, h] } } }
//! ```
//!
//! ## Control connection (client → server, once per session tick)
//! ```text
//! <empty payload>                                       nothing to report
//! { v: 1, input: 1, pos: [x, y], button: 1 }            click
//! { v: 1, input: 2, pos: [x, y] }                       move
//! { v: 1, input: 3, text: "hello" }                     type text
//! ```

pub mod control;
pub mod frame;

pub use control::{ControlMessage, Position};
pub use frame::{Frame, FrameEnvelope, PointerState};

/// Version stamped into every payload.
pub const PROTOCOL_VERSION: u8 = 1;

fn check_version(v: u8) -> crate::error::Result<()> {
    if v == PROTOCOL_VERSION {
        Ok(())
    } else {
        Err(crate::error::Error::UnsupportedVersion(v))
    }
}
