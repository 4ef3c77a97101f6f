//! Server wiring and lifecycle.
//!
//! Builds the capture producer, session registry, input replayer and
//! acceptor from a [`ServerConfig`], then runs the acceptor until the
//! stop handle is cancelled.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use kivnc_core::{
    Acceptor, CaptureProducer, CaptureSlot, CommandScreenSource, InputInjector, InputReplayer,
    Result, ScreenSource, SessionRegistry, XdotoolInjector,
};

use crate::config::ServerConfig;

// ── KivncServer ──────────────────────────────────────────────────

/// The top-level server.
pub struct KivncServer {
    config: ServerConfig,
    cancel: CancellationToken,
}

impl KivncServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// A handle that stops the server when cancelled, e.g. from a
    /// Ctrl-C handler.
    pub fn stop_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal the server to stop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run with the configured screenshot command and xdotool.
    pub async fn run(&self) -> Result<()> {
        let source = CommandScreenSource::new(self.config.capture.command.clone())?;
        info!(output = %source.output().display(), "screenshots via {}", self.config.capture.command[0]);
        self.run_with(Arc::new(source), Arc::new(XdotoolInjector::new()))
            .await
    }

    /// Run with explicit capture and injection collaborators.
    ///
    /// 1. Binds the data and control listeners (failure is returned).
    /// 2. Accepts viewer pairs until the stop handle fires.
    /// 3. Closes every session and waits for the capture producer.
    pub async fn run_with(
        &self,
        source: Arc<dyn ScreenSource>,
        injector: Arc<dyn InputInjector>,
    ) -> Result<()> {
        let producer = CaptureProducer::new(
            source,
            CaptureSlot::new(),
            self.config.to_capture_config(),
        );
        let registry = Arc::new(SessionRegistry::new(producer));

        let acceptor = Acceptor::bind(
            self.config.to_acceptor_config(),
            self.config.allow_list(),
            Arc::clone(&registry),
            InputReplayer::new(injector),
            self.config.to_session_config(),
        )
        .await?;

        acceptor.run(self.cancel.clone()).await;
        registry.shutdown().await;

        info!("kivnc server stopped");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::RgbImage;
    use kivnc_core::{Error, RecordingInjector};

    struct Black;

    impl ScreenSource for Black {
        fn capture(&self) -> Result<RgbImage> {
            Ok(RgbImage::new(8, 8))
        }

        fn pointer(&self) -> Result<(i32, i32)> {
            Ok((0, 0))
        }
    }

    fn ephemeral() -> ServerConfig {
        let mut cfg = ServerConfig::default();
        cfg.network.bind_host = "127.0.0.1".parse().unwrap();
        cfg.network.port = 0;
        cfg
    }

    #[test]
    fn stop_handle_works() {
        let server = KivncServer::new(ServerConfig::default());
        assert!(!server.is_stopped());
        server.stop_handle().cancel();
        assert!(server.is_stopped());
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let server = KivncServer::new(ephemeral());
        let stop = server.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            server.run_with(Arc::new(Black), Arc::new(RecordingInjector::new())),
        )
        .await
        .expect("server did not stop");
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn bind_failure_is_fatal() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = ephemeral();
        cfg.network.port = taken.local_addr().unwrap().port();

        let server = KivncServer::new(cfg);
        let result = server
            .run_with(Arc::new(Black), Arc::new(RecordingInjector::new()))
            .await;
        assert!(matches!(result, Err(Error::Bind { .. })));
    }
}
