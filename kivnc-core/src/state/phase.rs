//! Per-session lifecycle.
//!
//! ```text
//!  Handshaking ──► Streaming ──► Closed
//!       │                          ▲
//!       └──────────────────────────┘
//! ```
//!
//! A session never leaves `Closed`; a reconnecting viewer gets a new
//! session.

use std::time::Instant;

use crate::error::Error;

/// The current phase of a viewer session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Connection pair accepted; registering and configuring sockets.
    #[default]
    Handshaking,

    /// Exchanging frames and control messages.
    Streaming {
        /// When streaming began.
        since: Instant,
    },

    /// Both connections dropped. Terminal.
    Closed,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Streaming { .. } => write!(f, "Streaming"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

impl SessionPhase {
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Transition to `Streaming`.
    ///
    /// Valid from: `Handshaking`.
    pub fn begin_streaming(&mut self) -> Result<(), Error> {
        match self {
            Self::Handshaking => {
                *self = Self::Streaming {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(Error::Other(format!("cannot start streaming from {self}"))),
        }
    }

    /// Transition to `Closed` from any phase.
    pub fn close(&mut self) {
        *self = Self::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_lifecycle() {
        let mut phase = SessionPhase::default();
        assert_eq!(phase, SessionPhase::Handshaking);

        phase.begin_streaming().unwrap();
        assert!(phase.is_streaming());

        phase.close();
        assert!(phase.is_closed());
    }

    #[test]
    fn closed_is_terminal() {
        let mut phase = SessionPhase::Closed;
        assert!(phase.begin_streaming().is_err());
        assert!(phase.is_closed());
    }

    #[test]
    fn cannot_restart_streaming() {
        let mut phase = SessionPhase::Handshaking;
        phase.begin_streaming().unwrap();
        assert!(phase.begin_streaming().is_err());
    }

    #[test]
    fn display_format() {
        assert_eq!(SessionPhase::Handshaking.to_string(), "Handshaking");
        assert_eq!(
            SessionPhase::Streaming {
                since: Instant::now()
            }
            .to_string(),
            "Streaming"
        );
        assert_eq!(SessionPhase::Closed.to_string(), "Closed");
    }
}
