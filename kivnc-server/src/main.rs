//! kivnc server — entry point.
//!
//! ```text
//! kivnc-server                        Serve with ./kivnc.toml (or defaults)
//! kivnc-server --config <path>        Load a custom config TOML
//! kivnc-server --port 7000 --allow 10.0.
//!                                     Override config values (also KIVNC_* env)
//! kivnc-server --gen-config           Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;

use kivnc_server::config::{Overrides, ServerConfig};
use kivnc_server::logging;
use kivnc_server::service::KivncServer;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kivnc-server", about = "Stream this screen to remote viewers")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "kivnc.toml", env = "KIVNC_CONFIG")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(flatten)]
    overrides: Overrides,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ServerConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ServerConfig::load(&cli.config)?;
    config.apply(&cli.overrides);

    logging::init(&config.logging)?;

    info!("kivnc-server v{}", env!("CARGO_PKG_VERSION"));
    info!("config: {}", cli.config.display());
    info!(
        "data port: {}, control port: {}",
        config.network.port,
        config.network.port.wrapping_add(1)
    );
    info!("scale: {}%", config.capture.scale_percent);
    info!("allow: {:?}", config.access.allow);

    let server = KivncServer::new(config);
    let stop = server.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    server.run().await?;

    Ok(())
}
