use log::{error, info, warn};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use crate::client::handle_client;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::protocol::responses;

pub struct Server {
    listener: TcpListener,
    root: PathBuf,
    config: Arc<ServerConfig>,
    slots: Arc<Semaphore>,
}

impl Server {
    /// Resolves the server root and binds the control socket.
    ///
    /// Fails when the root does not exist, is not a directory, or the
    /// control address cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let configured_root = config.server_root_path();
        let root = tokio::fs::canonicalize(&configured_root)
            .await
            .map_err(|e| ServerError::Root(configured_root.clone(), e))?;

        let metadata = tokio::fs::metadata(&root)
            .await
            .map_err(|e| ServerError::Root(root.clone(), e))?;
        if !metadata.is_dir() {
            return Err(ServerError::Root(
                root,
                io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            ));
        }

        let socket = config.control_socket();
        let listener = TcpListener::bind(&socket)
            .await
            .map_err(|e| ServerError::Bind(socket.clone(), e))?;

        info!(
            "Server bound to {}, serving {}",
            listener.local_addr().map_err(|e| ServerError::Bind(socket, e))?,
            root.display()
        );

        let slots = Arc::new(Semaphore::new(config.max_clients));
        Ok(Self {
            listener,
            root,
            config: Arc::new(config),
            slots,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Canonical root every session is confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Accepts connections forever, one task per client.
    pub async fn run(self) {
        info!(
            "Accepting FTP clients (max {} concurrent)",
            self.config.max_clients
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => self.dispatch(stream, addr),
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                }
            }
        }
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!("Rejecting {}: client limit reached", addr);
                tokio::spawn(reject(stream, addr, self.config.control_write_timeout()));
                return;
            }
        };

        info!("Client connected: {}", addr);
        let root = self.root.clone();
        let config = Arc::clone(&self.config);

        // Spawn a task for each client so accept loop doesn't block
        tokio::spawn(async move {
            handle_client(stream, root, config).await;
            drop(permit);
        });
    }
}

async fn reject(mut stream: TcpStream, addr: SocketAddr, write_timeout: Duration) {
    let reply = responses::too_many_connections().to_string();
    match timeout(write_timeout, stream.write_all(reply.as_bytes())).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to notify rejected client {}: {}", addr, e),
        Err(_) => warn!("Rejected client {} is not reading", addr),
    }
    let _ = timeout(write_timeout, stream.shutdown()).await;
}
