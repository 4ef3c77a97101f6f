//! Dual-listener acceptor.
//!
//! Viewers open a data connection to `port` and a control connection to
//! `port + 1`. The acceptor takes one connection from each listener in
//! turn and promotes the pair to a [`Session`] only if both come from
//! the same host and that host is allow-listed. Rejected pairs are
//! dropped without a reply.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::AllowList;
use crate::error::{Error, Result};
use crate::input::InputReplayer;
use crate::session::{Session, SessionConfig};
use crate::state::SessionRegistry;
use crate::task::{SessionEvent, SessionPool};

// ── AcceptorConfig ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AcceptorConfig {
    /// Address both listeners bind to.
    pub bind_host: IpAddr,
    /// Data port; the control listener uses `port + 1`. `0` picks two
    /// ephemeral ports (tests).
    pub port: u16,
    /// Listen backlog for each socket.
    pub backlog: u32,
    /// How long to wait for the control connection after a data
    /// connection arrives.
    pub pair_window: Duration,
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::from([0, 0, 0, 0]),
            port: 6666,
            backlog: 10,
            pair_window: Duration::from_secs(5),
        }
    }
}

// ── Pair validation ──────────────────────────────────────────────

/// Why a connection pair was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairRejection {
    #[error("data from {data} but control from {control}")]
    AddressMismatch { data: IpAddr, control: IpAddr },

    #[error("{0} is not on the allow-list")]
    NotAllowed(IpAddr),
}

/// Decide whether a data/control pair may become a session.
pub fn check_pair(
    allow: &AllowList,
    data: SocketAddr,
    control: SocketAddr,
) -> std::result::Result<(), PairRejection> {
    let (data, control) = (data.ip().to_canonical(), control.ip().to_canonical());
    if data != control {
        return Err(PairRejection::AddressMismatch { data, control });
    }
    if !allow.permits(data) {
        return Err(PairRejection::NotAllowed(data));
    }
    Ok(())
}

// ── Acceptor ─────────────────────────────────────────────────────

/// Owns both listeners and every session spawned from them.
pub struct Acceptor {
    data: TcpListener,
    control: TcpListener,
    allow: AllowList,
    config: AcceptorConfig,
    registry: Arc<SessionRegistry>,
    replayer: InputReplayer,
    session_config: SessionConfig,
    pool: SessionPool,
}

enum Step {
    Stop,
    Reaped(SessionEvent),
    Accepted(std::io::Result<(TcpStream, SocketAddr)>),
}

impl Acceptor {
    /// Bind both listeners. Failure here is fatal for the server.
    pub async fn bind(
        config: AcceptorConfig,
        allow: AllowList,
        registry: Arc<SessionRegistry>,
        replayer: InputReplayer,
        session_config: SessionConfig,
    ) -> Result<Self> {
        let data = listen(SocketAddr::new(config.bind_host, config.port), config.backlog)?;
        let control_port = match config.port {
            0 => 0,
            port => port.checked_add(1).ok_or_else(|| {
                Error::Other(format!("data port {port} leaves no room for the control port"))
            })?,
        };
        let control = listen(SocketAddr::new(config.bind_host, control_port), config.backlog)?;

        if allow.is_empty() {
            warn!("allow-list is empty; every connection will be refused");
        }
        info!(
            data = %data.local_addr()?,
            control = %control.local_addr()?,
            "listening for viewers"
        );

        Ok(Self {
            data,
            control,
            allow,
            config,
            registry,
            replayer,
            session_config,
            pool: SessionPool::new(),
        })
    }

    pub fn data_addr(&self) -> Result<SocketAddr> {
        Ok(self.data.local_addr()?)
    }

    pub fn control_addr(&self) -> Result<SocketAddr> {
        Ok(self.control.local_addr()?)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Accept pairs until `cancel` fires, then close every session.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Stop,
                Some(event) = self.pool.recv() => Step::Reaped(event),
                accepted = self.data.accept() => Step::Accepted(accepted),
            };

            match step {
                Step::Stop => break,
                Step::Reaped(event) => self.pool.process_event(event),
                Step::Accepted(Ok((stream, peer))) => self.admit(stream, peer, &cancel).await,
                Step::Accepted(Err(e)) => warn!("data accept failed: {e}"),
            }
        }

        self.pool.shutdown().await;
        info!("acceptor stopped");
    }

    /// Wait for the matching control connection and promote the pair.
    async fn admit(&mut self, data: TcpStream, data_peer: SocketAddr, cancel: &CancellationToken) {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return,
            r = tokio::time::timeout(self.config.pair_window, self.control.accept()) => r,
        };

        let (control, control_peer) = match accepted {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                warn!(%data_peer, "control accept failed: {e}");
                return;
            }
            Err(_) => {
                warn!(
                    %data_peer,
                    "no control connection within {:?}; dropping data connection",
                    self.config.pair_window
                );
                return;
            }
        };

        if let Err(reason) = check_pair(&self.allow, data_peer, control_peer) {
            warn!(%data_peer, %control_peer, "rejected connection pair: {reason}");
            return;
        }

        for stream in [&data, &control] {
            if let Err(e) = stream.set_nodelay(true) {
                warn!(%data_peer, "cannot set TCP_NODELAY: {e}");
            }
        }

        self.pool.reap();
        let session = Session::new(
            data,
            control,
            data_peer,
            Arc::clone(&self.registry),
            self.replayer.clone(),
            self.session_config.clone(),
        );
        let id = self.pool.spawn(data_peer, move |token| session.run(token));
        info!(id, peer = %data_peer, active = self.pool.len(), "connection pair accepted");
    }
}

/// Bind a reusable listener with an explicit backlog.
fn listen(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let bind = || -> std::io::Result<TcpListener> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        socket.listen(backlog)
    };
    bind().map_err(|source| Error::Bind { addr, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn same_allowed_host_pairs() {
        let allow = AllowList::new(["192.168.0."]);
        assert_eq!(
            check_pair(&allow, addr("192.168.0.8:50000"), addr("192.168.0.8:50001")),
            Ok(())
        );
    }

    #[test]
    fn different_hosts_never_pair() {
        let allow = AllowList::new(["192.168.0."]);
        assert!(matches!(
            check_pair(&allow, addr("192.168.0.8:50000"), addr("192.168.0.9:50001")),
            Err(PairRejection::AddressMismatch { .. })
        ));
    }

    #[test]
    fn unlisted_host_is_refused() {
        let allow = AllowList::new(["192.168.0."]);
        assert_eq!(
            check_pair(&allow, addr("10.0.0.1:1"), addr("10.0.0.1:2")),
            Err(PairRejection::NotAllowed("10.0.0.1".parse().unwrap()))
        );
    }

    #[test]
    fn mapped_and_plain_forms_match() {
        let allow = AllowList::new(["127.0.0.1"]);
        assert_eq!(
            check_pair(&allow, addr("[::ffff:127.0.0.1]:1"), addr("127.0.0.1:2")),
            Ok(())
        );
    }

    #[test]
    fn bind_failure_names_the_address() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        // Without SO_REUSEPORT a second listener on a live port fails.
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt.block_on(async { listen(addr, 4) }).unwrap_err();
        assert!(matches!(err, Error::Bind { addr: a, .. } if a == addr));
    }
}
