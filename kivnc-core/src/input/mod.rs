//! Replays viewer intent as local input.
//!
//! A decoded [`ControlMessage`] becomes one [`InputAction`], which an
//! [`InputInjector`] performs as a single external invocation. Failures
//! are reported to the caller, which logs them and keeps the session.

pub mod mock;
pub mod xdotool;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::protocol::ControlMessage;

pub use mock::RecordingInjector;
pub use xdotool::XdotoolInjector;

// ── InputAction ──────────────────────────────────────────────────

/// What the injector is asked to do, in whole screen pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Move the pointer to an absolute position.
    MoveTo { x: i32, y: i32 },
    /// Move to a position, then click `button`.
    Click { x: i32, y: i32, button: u8 },
    /// Type a string.
    Type { text: String },
}

impl From<&ControlMessage> for InputAction {
    fn from(message: &ControlMessage) -> Self {
        match message {
            ControlMessage::PointerMove { pos } => InputAction::MoveTo {
                x: pos.x.round() as i32,
                y: pos.y.round() as i32,
            },
            ControlMessage::PointerClick { pos, button } => InputAction::Click {
                x: pos.x.round() as i32,
                y: pos.y.round() as i32,
                button: *button,
            },
            ControlMessage::TextInput { text } => InputAction::Type { text: text.clone() },
        }
    }
}

// ── InputInjector ────────────────────────────────────────────────

/// The external input-injection collaborator.
#[async_trait]
pub trait InputInjector: Send + Sync {
    async fn inject(&self, action: &InputAction) -> Result<()>;
}

// ── InputReplayer ────────────────────────────────────────────────

/// Maps control messages to injector calls. Shared by all sessions.
#[derive(Clone)]
pub struct InputReplayer {
    injector: Arc<dyn InputInjector>,
}

impl InputReplayer {
    pub fn new(injector: Arc<dyn InputInjector>) -> Self {
        Self { injector }
    }

    /// Perform `message` with exactly one injector call.
    pub async fn replay(&self, message: &ControlMessage) -> Result<()> {
        let action = InputAction::from(message);
        debug!(?action, "replaying input");
        self.injector.inject(&action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::protocol::Position;

    #[test]
    fn positions_round_to_pixels() {
        let action = InputAction::from(&ControlMessage::PointerMove {
            pos: Position::new(10.4, 19.6),
        });
        assert_eq!(action, InputAction::MoveTo { x: 10, y: 20 });
    }

    #[tokio::test]
    async fn click_is_one_invocation() {
        let injector = Arc::new(RecordingInjector::new());
        let replayer = InputReplayer::new(injector.clone());

        replayer
            .replay(&ControlMessage::PointerClick {
                pos: Position::new(100.0, 200.0),
                button: 1,
            })
            .await
            .unwrap();

        assert_eq!(
            injector.actions(),
            vec![InputAction::Click {
                x: 100,
                y: 200,
                button: 1
            }]
        );
    }

    #[tokio::test]
    async fn text_and_move_map_directly() {
        let injector = Arc::new(RecordingInjector::new());
        let replayer = InputReplayer::new(injector.clone());

        replayer
            .replay(&ControlMessage::TextInput { text: "hi".into() })
            .await
            .unwrap();
        replayer
            .replay(&ControlMessage::PointerMove {
                pos: Position::new(3.0, 4.0),
            })
            .await
            .unwrap();

        assert_eq!(
            injector.actions(),
            vec![
                InputAction::Type { text: "hi".into() },
                InputAction::MoveTo { x: 3, y: 4 },
            ]
        );
    }

    #[tokio::test]
    async fn injector_failure_is_returned() {
        let injector = Arc::new(RecordingInjector::failing());
        let replayer = InputReplayer::new(injector.clone());
        let err = replayer
            .replay(&ControlMessage::TextInput { text: "x".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Injection(_)));
        assert!(!err.is_session_fatal());
    }
}
