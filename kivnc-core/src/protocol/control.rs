//! Client → server control messages.
//!
//! The wire form is a loose map (`input`, `pos`, `button`, `text`); it is
//! validated once here and turned into [`ControlMessage`] so the rest of
//! the server matches on an exhaustive enum.

use serde::{Deserialize, Serialize};

use super::{PROTOCOL_VERSION, check_version};
use crate::error::{Error, Result};

/// `input` code for a click.
pub const INPUT_CLICK: u8 = 1;
/// `input` code for a pointer move.
pub const INPUT_MOVE: u8 = 2;
/// `input` code for text entry.
pub const INPUT_TEXT: u8 = 3;

/// Button clicked when the client does not name one.
pub const DEFAULT_BUTTON: u8 = 1;

/// Absolute position in capture-resolution pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Pointer or keyboard intent sent by a viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    PointerMove { pos: Position },
    PointerClick { pos: Position, button: u8 },
    TextInput { text: String },
}

/// Map form of a control payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ControlEnvelope {
    v: u8,
    #[serde(default)]
    input: Option<u8>,
    #[serde(default)]
    pos: Option<(f64, f64)>,
    #[serde(default)]
    button: Option<u8>,
    #[serde(default)]
    text: Option<String>,
}

impl ControlMessage {
    /// Decode a control payload. An empty payload means the client had
    /// nothing to report this tick.
    pub fn decode(payload: &[u8]) -> Result<Option<Self>> {
        if payload.is_empty() {
            return Ok(None);
        }

        let envelope: ControlEnvelope = rmp_serde::from_slice(payload)?;
        check_version(envelope.v)?;

        let pos = envelope
            .pos
            .map(|(x, y)| Position::new(x, y))
            .unwrap_or_default();
        if !pos.x.is_finite() || !pos.y.is_finite() {
            return Err(Error::Decode("non-finite pointer position".into()));
        }

        let message = match envelope.input {
            Some(INPUT_CLICK) => ControlMessage::PointerClick {
                pos,
                button: envelope.button.unwrap_or(DEFAULT_BUTTON),
            },
            Some(INPUT_TEXT) => ControlMessage::TextInput {
                text: envelope
                    .text
                    .ok_or_else(|| Error::Decode("text input without text".into()))?,
            },
            // Absent or unknown kinds fall back to a plain move.
            _ => ControlMessage::PointerMove { pos },
        };
        Ok(Some(message))
    }

    /// Encode into a control payload (viewer side).
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut envelope = ControlEnvelope {
            v: PROTOCOL_VERSION,
            ..Default::default()
        };
        match self {
            ControlMessage::PointerMove { pos } => {
                envelope.input = Some(INPUT_MOVE);
                envelope.pos = Some((pos.x, pos.y));
            }
            ControlMessage::PointerClick { pos, button } => {
                envelope.input = Some(INPUT_CLICK);
                envelope.pos = Some((pos.x, pos.y));
                envelope.button = Some(*button);
            }
            ControlMessage::TextInput { text } => {
                envelope.input = Some(INPUT_TEXT);
                envelope.text = Some(text.clone());
            }
        }
        Ok(rmp_serde::to_vec_named(&envelope)?)
    }
}
