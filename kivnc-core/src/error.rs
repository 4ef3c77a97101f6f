//! Domain-specific error types for the kivnc server.
//!
//! All fallible operations return `Result<T, Error>`. Which variants are
//! fatal depends on who observes them: connection, timeout and decode
//! errors end the owning session only, capture and injection errors are
//! logged and absorbed, and only a bind failure stops the process.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The canonical error type for kivnc.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error (including EOF mid-frame).
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The peer closed the stream cleanly between two frames.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// No exchange completed before the session deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// A length header announced more bytes than the reader accepts.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A listening socket could not be bound at startup.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    // ── Protocol Errors ──────────────────────────────────────────
    /// A payload did not match the wire schema.
    #[error("decode error: {0}")]
    Decode(String),

    /// A payload could not be serialised.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The peer speaks a different protocol version.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    // ── External Collaborators ───────────────────────────────────
    /// The screen-capture operation failed; the previous frame stays valid.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The input-injection tool failed or is missing.
    #[error("input injection failed: {0}")]
    Injection(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error ends the session that observed it.
    pub fn is_session_fatal(&self) -> bool {
        !matches!(self, Error::Capture(_) | Error::Injection(_))
    }
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Encoding(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Capture(e.to_string())
    }
}
