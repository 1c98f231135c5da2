use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};

use crate::client::{ClientRegistry, ConnectionId, SharedRegistry, handle_connection};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::error::handlers::handle_connection_error;

pub struct Server {
    registry: SharedRegistry,
    listener: TcpListener,
    config: Arc<RelayConfig>,
    active: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl Server {
    /// Bind the listen socket described by `config`.
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listen_addr = config.listen_addr();
        let listener = TcpListener::bind(&listen_addr).await.map_err(|e| {
            error!("Failed to bind to {}: {}", listen_addr, e);
            RelayError::from(e)
        })?;
        info!("Server bound to {}", listener.local_addr()?);

        Ok(Self {
            registry: ClientRegistry::shared(),
            listener,
            config: Arc::new(config),
            active: Arc::new(AtomicUsize::new(0)),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// The registry this server routes through.
    pub fn registry(&self) -> SharedRegistry {
        Arc::clone(&self.registry)
    }

    /// Accept connections until the process is terminated.
    pub async fn run(self) {
        match self.config.connection_limit() {
            Some(limit) => info!(
                "Signaling relay listening on {} (path {:?}, max {} connections)",
                self.config.listen_addr(),
                self.config.path,
                limit
            ),
            None => info!(
                "Signaling relay listening on {} (path {:?})",
                self.config.listen_addr(),
                self.config.path
            ),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.spawn_connection(stream, addr),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Some(limit) = self.config.connection_limit() {
            if self.active.load(Ordering::Relaxed) >= limit {
                warn!(
                    "Refusing connection from {}: {} connections already open",
                    addr, limit
                );
                return;
            }
        }

        let guard = ActiveGuard::new(Arc::clone(&self.active));
        let connection_id: ConnectionId = self.next_id.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::clone(&self.registry);
        let config = Arc::clone(&self.config);

        // Spawn a task for each client so accept loop doesn't block
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = handle_connection(stream, addr, connection_id, registry, config).await {
                handle_connection_error(&addr, &e);
            }
        });
    }
}

/// Counts a connection as active for as long as it lives.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::Relaxed);
        Self(active)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
