//! Background capture loop.
//!
//! Each tick: capture → downscale → query pointer → publish. A failed
//! capture leaves the previous frame in place and the loop carries on.
//! The loop stops when its `CancellationToken` fires; the token is
//! checked once per tick and raced against the inter-tick sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use image::imageops::{self, FilterType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{CaptureSlot, ScreenSource};
use crate::error::{Error, Result};
use crate::protocol::{Frame, PointerState};

/// Lower bound on the capture interval.
pub const MIN_INTERVAL: Duration = Duration::from_millis(20);

// ── CaptureConfig ────────────────────────────────────────────────

/// Configuration for [`CaptureProducer`].
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Downscale percentage applied to every capture (1..=100).
    pub scale_percent: u8,
    /// Minimum time between two capture starts.
    pub interval: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            scale_percent: 40,
            interval: Duration::from_millis(200),
        }
    }
}

// ── CaptureProducer ──────────────────────────────────────────────

/// Refreshes a [`CaptureSlot`] from a [`ScreenSource`].
///
/// Cheap to clone; the registry spawns one loop per 0→1 transition.
#[derive(Clone)]
pub struct CaptureProducer {
    source: Arc<dyn ScreenSource>,
    slot: CaptureSlot,
    config: CaptureConfig,
}

impl CaptureProducer {
    pub fn new(source: Arc<dyn ScreenSource>, slot: CaptureSlot, config: CaptureConfig) -> Self {
        Self {
            source,
            slot,
            config,
        }
    }

    /// The slot this producer publishes into.
    pub fn slot(&self) -> &CaptureSlot {
        &self.slot
    }

    /// Run the capture loop until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let interval = self.config.interval.max(MIN_INTERVAL);
        let scale = self.config.scale_percent;
        let mut failing = false;
        info!(?interval, scale, "capture producer started");

        while !cancel.is_cancelled() {
            let tick_start = Instant::now();

            let source = Arc::clone(&self.source);
            let captured =
                tokio::task::spawn_blocking(move || capture_frame(source.as_ref(), scale)).await;

            match captured {
                Ok(Ok(frame)) => match self.slot.publish(frame) {
                    Ok(sequence) => {
                        debug!(sequence, "frame published");
                        failing = false;
                    }
                    Err(e) => warn!("cannot encode captured frame: {e}"),
                },
                Ok(Err(e)) => {
                    // Only the first failure of a streak is worth a warning.
                    if failing {
                        debug!("capture failed again: {e}");
                    } else {
                        warn!("capture failed, keeping previous frame: {e}");
                    }
                    failing = true;
                }
                Err(e) => warn!("capture task aborted: {e}"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = pace(tick_start, interval) => {}
            }
        }

        info!("capture producer stopped");
    }
}

/// Capture one frame from `source`, downscaled to `scale_percent`.
pub fn capture_frame(source: &dyn ScreenSource, scale_percent: u8) -> Result<Frame> {
    let full = source.capture()?;
    let total_size = full.dimensions();
    if total_size.0 == 0 || total_size.1 == 0 {
        return Err(Error::Capture("source returned an empty image".into()));
    }
    let image = downscale(full, scale_percent);
    let (x, y) = source.pointer()?;
    Ok(Frame::new(image, PointerState { x, y, total_size }))
}

/// Resize to `percent` of the original size (Lanczos3). Each side stays
/// at least one pixel.
pub fn downscale(image: RgbImage, percent: u8) -> RgbImage {
    let percent = percent.clamp(1, 100) as u32;
    if percent == 100 {
        return image;
    }
    let (w, h) = image.dimensions();
    let width = (w * percent / 100).max(1);
    let height = (h * percent / 100).max(1);
    imageops::resize(&image, width, height, FilterType::Lanczos3)
}

/// Sleep for the remainder of the interval.
async fn pace(tick_start: Instant, interval: Duration) {
    let elapsed = tick_start.elapsed();
    if elapsed < interval {
        tokio::time::sleep(interval - elapsed).await;
    }
}

// ── Tests ────────────────────────────────────────────────────────
