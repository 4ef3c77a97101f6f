//! # kivnc-server — Remote Screen Server
//!
//! Captures the local screen with an external screenshot tool, streams
//! it to allow-listed viewers over a data/control TCP port pair, and
//! replays their pointer and keyboard input through `xdotool`.
//!
//! ## Modes
//!
//! - **Serve**: Run in the foreground until Ctrl-C (default).
//! - **Gen-config**: Print the default TOML configuration (`--gen-config`).

pub mod config;
pub mod logging;
pub mod service;
