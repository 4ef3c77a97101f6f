//! Per-viewer duplex loop over a data connection and a control
//! connection.
//!
//! Each iteration sends the latest frame first, then waits for one
//! control message:
//!
//! ```text
//! Server ──[frame payload]──────► data conn
//! Server ◄──[control payload]──── control conn   (bounded by timeout)
//! ```
//!
//! Capture runs on its own cadence behind the [`CaptureSlot`], so a slow
//! viewer only slows its own stream.
//!
//! [`CaptureSlot`]: crate::capture::CaptureSlot

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::codec::FrameCodec;
use crate::error::{Error, Result};
use crate::input::InputReplayer;
use crate::protocol::ControlMessage;
use crate::state::{SessionPhase, SessionRegistry};

/// Default upper bound on a control payload.
pub const DEFAULT_MAX_CONTROL_FRAME: usize = 64 * 1024;

// ── SessionConfig ────────────────────────────────────────────────

/// Tunables shared by every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum time since the last completed exchange.
    pub timeout: Duration,
    /// Minimum time between two frames sent to the same viewer.
    pub frame_interval: Duration,
    /// Largest control payload accepted before the session is dropped.
    pub max_control_frame: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            frame_interval: Duration::from_millis(200),
            max_control_frame: DEFAULT_MAX_CONTROL_FRAME,
        }
    }
}

// ── Session ──────────────────────────────────────────────────────

/// One connected viewer.
pub struct Session<D, C> {
    data: Framed<D, FrameCodec>,
    control: Framed<C, FrameCodec>,
    peer: SocketAddr,
    registry: Arc<SessionRegistry>,
    replayer: InputReplayer,
    config: SessionConfig,
    phase: SessionPhase,
    last_activity: Instant,
    exchanges: u64,
}

impl<D, C> Session<D, C>
where
    D: AsyncRead + AsyncWrite + Unpin + Send,
    C: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        data: D,
        control: C,
        peer: SocketAddr,
        registry: Arc<SessionRegistry>,
        replayer: InputReplayer,
        config: SessionConfig,
    ) -> Self {
        Self {
            data: Framed::new(data, FrameCodec::new()),
            control: Framed::new(control, FrameCodec::with_max_length(config.max_control_frame)),
            peer,
            registry,
            replayer,
            config,
            phase: SessionPhase::default(),
            last_activity: Instant::now(),
            exchanges: 0,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Run until the viewer disconnects, times out, sends garbage, or
    /// `cancel` fires. Cancellation is a clean exit (`Ok`).
    ///
    /// The session is counted in the registry for exactly the duration
    /// of this call; both connections are closed before it is released.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let lease = self.registry.lease();
        self.phase.begin_streaming()?;
        self.last_activity = Instant::now();
        info!(peer = %self.peer, "session started");

        let result = tokio::select! {
            r = self.stream() => r,
            _ = cancel.cancelled() => Ok(()),
        };

        self.phase.close();
        match &result {
            Ok(()) => info!(peer = %self.peer, exchanges = self.exchanges, "session closed"),
            Err(e) => info!(peer = %self.peer, exchanges = self.exchanges, "session ended: {e}"),
        }

        drop(self);
        drop(lease);
        result
    }

    async fn stream(&mut self) -> Result<()> {
        let limit = self.config.timeout;
        loop {
            let tick_start = Instant::now();
            let deadline = self.last_activity + limit;

            let payload = self.registry.slot().payload()?;
            timeout_at(deadline, self.data.send(payload))
                .await
                .map_err(|_| Error::Timeout(limit))??;

            let frame = match timeout_at(deadline, self.control.next()).await {
                Err(_) => return Err(Error::Timeout(limit)),
                Ok(None) => return Err(Error::ConnectionClosed),
                Ok(Some(frame)) => frame?,
            };

            if let Some(message) = ControlMessage::decode(&frame)? {
                debug!(peer = %self.peer, ?message, "control message");
                match timeout_at(deadline, self.replayer.replay(&message)).await {
                    Err(_) => return Err(Error::Timeout(limit)),
                    Ok(Err(e)) => warn!(peer = %self.peer, "input replay failed: {e}"),
                    Ok(Ok(())) => {}
                }
            }

            self.last_activity = Instant::now();
            self.exchanges += 1;

            let elapsed = tick_start.elapsed();
            if elapsed < self.config.frame_interval {
                tokio::time::sleep(self.config.frame_interval - elapsed).await;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
