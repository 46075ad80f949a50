//! WebSocket listener
//!
//! Runs the TCP accept loop and spawns one session task per socket.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::hub::ChatHub;
use crate::message::MessageStore;
use crate::server::config::ServerConfig;
use crate::server::connection::WsConnection;

/// Real-time chat server
pub struct ChatServer<S: MessageStore> {
    config: ServerConfig,
    hub: Arc<ChatHub<S>>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl<S: MessageStore> ChatServer<S> {
    /// Create a server around an existing hub
    pub fn new(config: ServerConfig, hub: Arc<ChatHub<S>>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            hub,
            connection_semaphore,
        }
    }

    pub fn hub(&self) -> &Arc<ChatHub<S>> {
        &self.hub
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Chat server listening");
        Ok(listener)
    }

    /// Run the server until the process exits
    pub async fn run(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Run the server until `shutdown` completes
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_until(listener, shutdown).await
    }

    /// Accept on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => self.handle_connection(socket, peer_addr),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Accept on an already bound listener until `shutdown` completes
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.serve(listener) => result,
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        let permit = match &self.connection_semaphore {
            Some(sem) => match Arc::clone(sem).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
                return;
            }
        }

        tracing::debug!(peer = %peer_addr, "New TCP connection");

        let session = WsConnection::new(
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.hub),
        );

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = session.run().await {
                tracing::debug!(peer = %peer_addr, error = %e, "Session error");
            }
        });
    }
}
