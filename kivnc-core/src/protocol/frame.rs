//! Captured frames and their server → client encoding.

use bytes::Bytes;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::{PROTOCOL_VERSION, check_version};
use crate::error::{Error, Result};

/// Bytes per pixel of the raster carried on the wire (RGB8).
pub const CHANNELS: u8 = 3;

// ── PointerState ─────────────────────────────────────────────────

/// Pointer position and the display size it refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerState {
    /// Pointer X in full-resolution display pixels.
    pub x: i32,
    /// Pointer Y in full-resolution display pixels.
    pub y: i32,
    /// Display `(width, height)` before downscaling.
    pub total_size: (u32, u32),
}

// ── Frame ────────────────────────────────────────────────────────

/// One captured screen image plus the pointer state sampled with it.
///
/// Frames are never mutated after publication; a new capture replaces
/// the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Downscaled screen image.
    pub image: RgbImage,
    /// Pointer state at capture time.
    pub pointer: PointerState,
}

impl Frame {
    pub fn new(image: RgbImage, pointer: PointerState) -> Self {
        Self { image, pointer }
    }

    /// Serialise into a data-connection payload.
    pub fn encode(&self) -> Result<Bytes> {
        let envelope = FrameEnvelope {
            v: PROTOCOL_VERSION,
            frame: Some(WireFrame {
                width: self.image.width(),
                height: self.image.height(),
                channels: CHANNELS,
                pixels: Bytes::copy_from_slice(self.image.as_raw()),
                pointer: self.pointer,
            }),
        };
        Ok(Bytes::from(rmp_serde::to_vec_named(&envelope)?))
    }
}

// ── Wire types ───────────────────────────────────────────────────

/// Top-level data-connection payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameEnvelope {
    pub v: u8,
    pub frame: Option<WireFrame>,
}

/// Raster plus pointer, as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Bytes,
    pub pointer: PointerState,
}

impl FrameEnvelope {
    /// Payload sent while no frame has been published yet.
    pub fn empty_payload() -> Result<Bytes> {
        let envelope = FrameEnvelope {
            v: PROTOCOL_VERSION,
            frame: None,
        };
        Ok(Bytes::from(rmp_serde::to_vec_named(&envelope)?))
    }

    /// Decode a data-connection payload into a [`Frame`] (`None` for the
    /// empty sentinel). Used by viewers and tests.
    pub fn decode(payload: &[u8]) -> Result<Option<Frame>> {
        let envelope: FrameEnvelope = rmp_serde::from_slice(payload)?;
        check_version(envelope.v)?;

        let Some(wire) = envelope.frame else {
            return Ok(None);
        };
        if wire.channels != CHANNELS {
            return Err(Error::Decode(format!(
                "unsupported channel count {}",
                wire.channels
            )));
        }
        let image = RgbImage::from_raw(wire.width, wire.height, wire.pixels.to_vec())
            .ok_or_else(|| {
                Error::Decode(format!(
                    "{} pixel bytes do not fit {}x{}",
                    wire.pixels.len(),
                    wire.width,
                    wire.height
                ))
            })?;
        Ok(Some(Frame::new(image, wire.pointer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        let image = RgbImage::from_fn(4, 2, |x, y| image::Rgb([x as u8, y as u8, 9]));
        Frame::new(
            image,
            PointerState {
                x: 100,
                y: 50,
                total_size: (1920, 1080),
            },
        )
    }

    #[test]
    fn frame_survives_the_wire() {
        let frame = sample();
        let payload = frame.encode().unwrap();
        let decoded = FrameEnvelope::decode(&payload).unwrap().unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn empty_sentinel_decodes_to_none() {
        let payload = FrameEnvelope::empty_payload().unwrap();
        assert!(!payload.is_empty());
        assert!(FrameEnvelope::decode(&payload).unwrap().is_none());
    }

    #[test]
    fn mismatched_raster_is_rejected() {
        let envelope = FrameEnvelope {
            v: PROTOCOL_VERSION,
            frame: Some(WireFrame {
                width: 10,
                height: 10,
                channels: CHANNELS,
                pixels: Bytes::from_static(&[0; 12]),
                pointer: sample().pointer,
            }),
        };
        let payload = rmp_serde::to_vec_named(&envelope).unwrap();
        assert!(matches!(
            FrameEnvelope::decode(&payload),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let envelope = FrameEnvelope { v: 7, frame: None };
        let payload = rmp_serde::to_vec_named(&envelope).unwrap();
        assert!(matches!(
            FrameEnvelope::decode(&payload),
            Err(Error::UnsupportedVersion(7))
        ));
    }
}
