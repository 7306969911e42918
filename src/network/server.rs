//! Network Server
//!
//! TCP server for accepting calls from other nodes. Every connection is
//! served on its own task, so inbound calls run concurrently with each
//! other and with the node's own outbound rounds.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use super::{read_message, write_message, Message};
use crate::error::{Error, Result};

/// Answers inbound requests
#[async_trait::async_trait]
pub trait MessageHandler: Send + Sync {
    /// Produce the reply for one request
    async fn handle(&self, peer_addr: &str, message: Message) -> Message;
}

/// Network server for cluster communication
pub struct NetworkServer {
    /// Bound listener
    listener: TcpListener,
    /// Request handler
    handler: Arc<dyn MessageHandler>,
    /// Shutdown signal
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl NetworkServer {
    /// Bind the listening socket.
    ///
    /// Failure here is fatal for the node: peers could not reach it.
    pub async fn bind(bind_address: &str, handler: Arc<dyn MessageHandler>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|source| Error::Bind {
                address: bind_address.to_string(),
                source,
            })?;
        let (shutdown_tx, _) = tokio::sync::watch::channel(false);

        Ok(Self {
            listener,
            handler,
            shutdown: shutdown_tx,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until stopped
    pub async fn start(&self) -> Result<()> {
        tracing::info!("Network server listening on {}", self.local_addr()?);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            let peer_addr = addr.to_string();
                            let handler = Arc::clone(&self.handler);

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(socket, peer_addr.clone(), handler).await {
                                    tracing::warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Network server stopped");
        Ok(())
    }

    /// Stop the server
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Serve requests on one connection until the peer hangs up
async fn handle_connection(
    socket: TcpStream,
    peer_addr: String,
    handler: Arc<dyn MessageHandler>,
) -> Result<()> {
    socket.set_nodelay(true)?;
    let (mut reader, mut writer) = socket.into_split();

    loop {
        match read_message(&mut reader).await {
            Ok(message) => {
                tracing::trace!("Received {} from {}", message.type_name(), peer_addr);
                let response = if message.is_request() {
                    handler.handle(&peer_addr, message).await
                } else {
                    tracing::debug!("Dropping {} from {}: not a request", message.type_name(), peer_addr);
                    Message::Error {
                        message: format!("{} is not a request", message.type_name()),
                    }
                };
                write_message(&mut writer, &response).await?;
            }
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Connection closed
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}
