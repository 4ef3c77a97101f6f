//! Supervisor for spawned session tasks.
//!
//! Every session runs in its own Tokio task under a child of the pool's
//! `CancellationToken`. Finished sessions report back over a channel and
//! are removed from the pool; `shutdown` cancels and joins whatever is
//! still running.

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;

/// Identifier assigned to each spawned session.
pub type SessionId = u64;

#[derive(Debug)]
pub enum SessionEvent {
    Finished(SessionId),
    Failed(SessionId, String),
}

impl SessionEvent {
    pub fn id(&self) -> SessionId {
        match self {
            SessionEvent::Finished(id) | SessionEvent::Failed(id, _) => *id,
        }
    }
}

struct TrackedSession {
    peer: SocketAddr,
    handle: JoinHandle<()>,
}

pub struct SessionPool {
    sessions: HashMap<SessionId, TrackedSession>,
    next_id: SessionId,
    cancel: CancellationToken,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// A pool whose sessions are also cancelled when `cancel` fires.
    pub fn with_token(cancel: CancellationToken) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            cancel,
            events_tx,
            events_rx,
        }
    }

    /// Spawn a session task.
    ///
    /// `f` receives the session's own cancellation token.
    pub fn spawn<F, Fut>(&mut self, peer: SocketAddr, f: F) -> SessionId
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;

        let fut = f(self.cancel.child_token());
        let events_tx = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            let event = match fut.await {
                Ok(()) => SessionEvent::Finished(id),
                Err(e) => SessionEvent::Failed(id, e.to_string()),
            };
            let _ = events_tx.send(event);
        });

        self.sessions.insert(
            id,
            TrackedSession { peer, handle },
        );
        id
    }

    /// Wait for the next session to finish.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Forget a finished session.
    pub fn process_event(&mut self, event: SessionEvent) {
        let id = event.id();
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        match event {
            SessionEvent::Finished(_) => debug!(id, peer = %session.peer, "session task finished"),
            SessionEvent::Failed(_, reason) => {
                debug!(id, peer = %session.peer, "session task ended: {reason}")
            }
        }
    }

    /// Process every event already queued, without waiting.
    pub fn reap(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.process_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Cancel every session and wait for all of them to exit.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let sessions: Vec<_> = self.sessions.drain().collect();
        if !sessions.is_empty() {
            info!(count = sessions.len(), "waiting for sessions to close");
        }
        for (_, session) in sessions {
            let _ = session.handle.await;
        }
        self.reap();
    }
}

impl Default for SessionPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::time::Duration;

    fn peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[tokio::test]
    async fn finished_sessions_are_removed() {
        let mut pool = SessionPool::new();
        let ok = pool.spawn(peer(), |_| async { Ok(()) });
        let failed = pool.spawn(peer(), |_| async { Err(Error::ConnectionClosed) });
        assert_eq!(pool.len(), 2);

        for _ in 0..2 {
            let event = pool.recv().await.unwrap();
            match &event {
                SessionEvent::Finished(id) => assert_eq!(*id, ok),
                SessionEvent::Failed(id, reason) => {
                    assert_eq!(*id, failed);
                    assert!(reason.contains("closed"));
                }
            }
            pool.process_event(event);
        }
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn shutdown_joins_everything() {
        let parent = CancellationToken::new();
        let mut pool = SessionPool::with_token(parent.clone());
        for _ in 0..5 {
            pool.spawn(peer(), |token| async move {
                token.cancelled().await;
                Ok(())
            });
        }
        tokio::time::timeout(Duration::from_secs(1), pool.shutdown())
            .await
            .expect("shutdown hung");
        assert!(pool.is_empty());
        assert!(parent.is_cancelled());
    }
}
