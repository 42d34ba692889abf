//! Binds the Cassandra-facing port and spawns one handler task per
//! accepted connection. `stop` is cooperative: it stops the accept loop
//! and waits for in-flight connection tasks to finish before returning.

use std::{
    net::SocketAddr,
    sync::atomic::{AtomicBool, Ordering},
};

use tokio::{net::TcpSocket, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{error::StartupError, handler, handler::HandlerContext, health::HealthState};

/// Matches the accept backlog the JVM reference deployment configures.
const BACKLOG: u32 = 50;

pub struct Listener {
    addr: SocketAddr,
    ctx: HandlerContext,
    health: Option<HealthState>,
    cancellation: CancellationToken,
    started: AtomicBool,
}

impl Listener {
    pub fn new(addr: SocketAddr, ctx: HandlerContext, health: Option<HealthState>) -> Self {
        Self {
            addr,
            ctx,
            health,
            cancellation: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Stops the accept loop. Calling this before `serve` has bound the
    /// socket is a programmer error.
    pub fn stop(&self) {
        assert!(
            self.started.load(Ordering::SeqCst),
            "Listener::stop called before Listener::serve started accepting connections"
        );
        self.cancellation.cancel();
    }

    pub async fn serve(&self) -> Result<(), StartupError> {
        let socket = if self.addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|source| StartupError::Bind {
            addr: self.addr,
            source,
        })?;

        socket
            .set_reuseaddr(true)
            .map_err(|source| StartupError::Bind {
                addr: self.addr,
                source,
            })?;
        socket
            .bind(self.addr)
            .map_err(|source| StartupError::Bind {
                addr: self.addr,
                source,
            })?;
        let listener = socket.listen(BACKLOG).map_err(|source| StartupError::Bind {
            addr: self.addr,
            source,
        })?;

        self.started.store(true, Ordering::SeqCst);
        tracing::info!(addr = %self.addr, "listening for cassandra clients");

        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted connection");
                        self.ctx.metrics.connection_accepted();
                        tasks.spawn(handler::run(stream, self.ctx.clone()));
                    }
                    Err(err) => tracing::warn!(?err, "accept failed"),
                },
            }
        }

        if let Some(health) = &self.health {
            health.mark_stopped();
        }

        tracing::info!("draining in-flight connections");
        while tasks.join_next().await.is_some() {}

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        cache::AttachmentsCache, error::SessionError, metrics::Metrics, session::SessionManager,
    };

    struct DummySource;

    #[async_trait]
    impl crate::session::SessionSource for DummySource {
        async fn create_session(&self, _database_uri: &str) -> Result<String, SessionError> {
            Ok("projects/p/instances/i/databases/d/sessions/s".into())
        }
    }

    #[tokio::test]
    #[should_panic(expected = "Listener::stop called before Listener::serve")]
    async fn stop_before_serve_panics() {
        let cache = Arc::new(AttachmentsCache::default());
        let ctx = HandlerContext {
            cache: cache.clone(),
            sessions: Arc::new(SessionManager::new(Arc::new(DummySource), "db")),
            adapter: Arc::new(crate::adapter::AdapterClient::test_stub(cache)),
            metrics: Metrics::new(false),
        };
        let listener = Listener::new("127.0.0.1:0".parse().unwrap(), ctx, None);
        listener.stop();
    }
}
