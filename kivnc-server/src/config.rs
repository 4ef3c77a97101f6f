//! Configuration for the kivnc server.
//!
//! Values come from a TOML file (every field optional), then command-line
//! flags or `KIVNC_*` environment variables override them.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kivnc_core::capture::producer::MIN_INTERVAL;
use kivnc_core::{AcceptorConfig, AllowList, CaptureConfig, SessionConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening sockets.
    pub network: NetworkConfig,
    /// Per-viewer session tuning.
    pub session: SessionSettings,
    /// Screen capture settings.
    pub capture: CaptureSettings,
    /// Who may connect.
    pub access: AccessConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address both listeners bind to.
    pub bind_host: IpAddr,
    /// Data port; control listens on `port + 1`.
    pub port: u16,
    /// Listen backlog per socket.
    pub backlog: u32,
    /// Seconds to wait for the control connection after the data one.
    pub pair_window_secs: u64,
    /// Largest accepted control payload in bytes.
    pub max_control_frame: usize,
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Seconds without a completed exchange before a viewer is dropped.
    pub timeout_secs: u64,
    /// Minimum milliseconds between two frames sent to one viewer.
    pub frame_interval_ms: u64,
}

/// Screen capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Downscale percentage (1..=100).
    pub scale_percent: u8,
    /// Milliseconds between capture starts.
    pub interval_ms: u64,
    /// Screenshot command; the last argument is the file it writes.
    pub command: Vec<String>,
}

/// Access control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Address prefixes allowed to connect (`*` for any).
    pub allow: Vec<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs go to stderr only.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::from([0, 0, 0, 0]),
            port: 6666,
            backlog: 10,
            pair_window_secs: 5,
            max_control_frame: kivnc_core::session::DEFAULT_MAX_CONTROL_FRAME,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            frame_interval_ms: 200,
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            scale_percent: 40,
            interval_ms: 200,
            command: vec![
                "xfce4-screenshooter".into(),
                "-f".into(),
                "-s".into(),
                "/tmp/kivnc/shot.png".into(),
            ],
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow: vec!["127.0.0.1".into(), "192.168.".into()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

// ── Overrides ────────────────────────────────────────────────────

/// Command-line / environment overrides applied on top of the file.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Bind address for both listeners.
    #[arg(long, env = "KIVNC_HOST")]
    pub host: Option<IpAddr>,

    /// Data port (control uses port + 1).
    #[arg(long, env = "KIVNC_PORT")]
    pub port: Option<u16>,

    /// Capture downscale percentage.
    #[arg(long, env = "KIVNC_SCALE")]
    pub scale: Option<u8>,

    /// Allowed address prefix; repeat for several. Replaces the file's list.
    #[arg(long = "allow", env = "KIVNC_ALLOW", value_delimiter = ',')]
    pub allow: Vec<String>,

    /// Session inactivity timeout in seconds.
    #[arg(long, env = "KIVNC_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Capture interval in milliseconds.
    #[arg(long, env = "KIVNC_INTERVAL")]
    pub interval: Option<u64>,
}

// ── Loading ──────────────────────────────────────────────────────

impl ServerConfig {
    /// Load configuration from a TOML file.
    ///
    /// A missing file means defaults. A file that exists but cannot be
    /// read or parsed is an error, never a silent fallback.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Apply command-line / environment overrides.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(host) = overrides.host {
            self.network.bind_host = host;
        }
        if let Some(port) = overrides.port {
            self.network.port = port;
        }
        if let Some(scale) = overrides.scale {
            self.capture.scale_percent = scale;
        }
        if !overrides.allow.is_empty() {
            self.access.allow = overrides.allow.clone();
        }
        if let Some(timeout) = overrides.timeout {
            self.session.timeout_secs = timeout;
        }
        if let Some(interval) = overrides.interval {
            self.capture.interval_ms = interval;
        }
    }

    pub fn to_acceptor_config(&self) -> AcceptorConfig {
        AcceptorConfig {
            bind_host: self.network.bind_host,
            port: self.network.port,
            backlog: self.network.backlog.max(1),
            pair_window: Duration::from_secs(self.network.pair_window_secs.max(1)),
        }
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_secs(self.session.timeout_secs.max(1)),
            frame_interval: Duration::from_millis(self.session.frame_interval_ms),
            max_control_frame: self.network.max_control_frame.max(64),
        }
    }

    pub fn to_capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            scale_percent: self.capture.scale_percent.clamp(1, 100),
            interval: Duration::from_millis(self.capture.interval_ms).max(MIN_INTERVAL),
        }
    }

    pub fn allow_list(&self) -> AllowList {
        AllowList::new(self.access.allow.iter().cloned())
    }
}

// ── Tests ────────────────────────────────────────────────────────
