//! In-memory injector for tests and dry runs.
//!
//! Records every action instead of touching the desktop. With
//! `failing()` every call returns [`Error::Injection`] after recording,
//! which exercises the "log and keep the session" path.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{InputAction, InputInjector};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct RecordingInjector {
    actions: Mutex<Vec<InputAction>>,
    should_fail: bool,
}

impl RecordingInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// An injector whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Actions received so far, in order.
    pub fn actions(&self) -> Vec<InputAction> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl InputInjector for RecordingInjector {
    async fn inject(&self, action: &InputAction) -> Result<()> {
        self.actions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(action.clone());
        if self.should_fail {
            return Err(Error::Injection("recording injector set to fail".into()));
        }
        Ok(())
    }
}
