//! `xdotool`-based injection for X11 desktops.

use async_trait::async_trait;
use tokio::process::Command;

use super::{InputAction, InputInjector};
use crate::error::{Error, Result};

/// Default xdotool binary, resolved through `PATH`.
pub const XDOTOOL: &str = "xdotool";

/// Runs one `xdotool` process per action.
#[derive(Debug, Clone)]
pub struct XdotoolInjector {
    program: String,
}

impl XdotoolInjector {
    pub fn new() -> Self {
        Self::with_program(XDOTOOL)
    }

    /// Use a specific binary instead of `xdotool` from `PATH`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments passed to xdotool for `action`.
    pub fn args(action: &InputAction) -> Vec<String> {
        match action {
            InputAction::MoveTo { x, y } => {
                vec!["mousemove".into(), x.to_string(), y.to_string()]
            }
            InputAction::Click { x, y, button } => vec![
                "mousemove".into(),
                x.to_string(),
                y.to_string(),
                "click".into(),
                button.to_string(),
            ],
            InputAction::Type { text } => vec!["type".into(), "--".into(), text.clone()],
        }
    }
}

impl Default for XdotoolInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputInjector for XdotoolInjector {
    async fn inject(&self, action: &InputAction) -> Result<()> {
        let out = Command::new(&self.program)
            .args(Self::args(action))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Injection(format!("{}: {e}", self.program)))?;

        if !out.status.success() {
            return Err(Error::Injection(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}
