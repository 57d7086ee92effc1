//! Point cloud server listener
//!
//! Owns the TCP accept loop, the broadcaster task and every connection task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time;

use crate::broadcast::Broadcaster;
use crate::capture::FrameSource;
use crate::error::{Error, Result};
use crate::registry::ClientRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Point cloud streaming server
pub struct StreamServer {
    config: ServerConfig,
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl StreamServer {
    /// Validate the configuration and bind the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.broadcast.validate()?;

        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "Point cloud server listening");

        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            config,
            listener,
            registry: Arc::new(ClientRegistry::new()),
            connection_semaphore,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a reference to the client registry
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve clients from `source` until `shutdown` resolves
    ///
    /// Returns an error if the frame source is lost. On the way out the
    /// broadcaster is stopped, every client is dropped and connection tasks
    /// get `shutdown_grace` to finish before they are aborted.
    pub async fn run_until<S, F>(self, source: S, shutdown: F) -> Result<()>
    where
        S: FrameSource,
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let broadcaster = Broadcaster::new(
            source,
            Arc::clone(&self.registry),
            self.config.broadcast.clone(),
        );
        let mut stop = shutdown_rx.clone();
        let mut broadcast_task = tokio::spawn(broadcaster.run(async move {
            let _ = stop.wait_for(|stop| *stop).await;
        }));
        let mut broadcaster_done = false;

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break Ok(());
                }

                joined = &mut broadcast_task => {
                    broadcaster_done = true;
                    break match joined {
                        Ok(result) => result,
                        Err(e) => Err(Error::Task(e)),
                    };
                }

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => {
                        self.handle_connection(&mut connections, socket, peer_addr, &shutdown_rx);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");
                    }
                },

                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        tracing::warn!(error = %e, "Connection task failed");
                    }
                }
            }
        };

        let _ = shutdown_tx.send(true);
        let grace = self.config.shutdown_grace;

        if !broadcaster_done {
            match time::timeout(grace, &mut broadcast_task).await {
                Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Broadcaster stopped with error"),
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("Broadcaster did not stop in time, aborting");
                    broadcast_task.abort();
                }
            }
        }

        let dropped = self.registry.clear().await;
        tracing::info!(clients = dropped, "Dropped remaining clients");

        let drained = time::timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Connections did not close in time, aborting"
            );
            connections.shutdown().await;
        }

        tracing::info!("Server stopped");
        result
    }

    fn handle_connection(
        &self,
        connections: &mut JoinSet<()>,
        socket: TcpStream,
        peer_addr: SocketAddr,
        shutdown: &watch::Receiver<bool>,
    ) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        tracing::debug!(peer = %peer_addr, "New connection");

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let connection = Connection::new(
            socket,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.registry),
            shutdown.clone(),
        );

        connections.spawn(async move {
            let _permit = permit;

            match connection.run().await {
                Ok(reason) => {
                    tracing::debug!(peer = %peer_addr, reason = %reason, "Connection closed")
                }
                Err(e) => tracing::debug!(peer = %peer_addr, error = %e, "Connection error"),
            }
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}
