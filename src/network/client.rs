//! Network Client
//!
//! TCP client for calling other nodes. Each call dials a fresh
//! connection, so a restarted peer is reachable again on the next call.

use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message, Message, PeerTransport};
use crate::error::{Error, Result};

/// Network client for connecting to peer nodes
#[derive(Debug, Clone)]
pub struct NetworkClient {
    /// Connection timeout
    connect_timeout: Duration,
    /// Request timeout (write + read, after connecting)
    request_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Send a message to a peer and wait for response
    pub async fn send(&self, address: &str, message: Message) -> Result<Message> {
        let mut stream = self.connect(address).await?;

        let result = timeout(self.request_timeout, async {
            let (mut reader, mut writer) = stream.split();
            write_message(&mut writer, &message).await?;
            read_message(&mut reader).await
        })
        .await;

        match result {
            Ok(inner_result) => inner_result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl PeerTransport for NetworkClient {
    async fn call(&self, address: &str, message: Message) -> Result<Message> {
        self.send(address, message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connection_failure() {
        let client = NetworkClient::new(Duration::from_millis(100), Duration::from_millis(500));

        // Grab a free port and release it so nothing is listening there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = client.send(&address, Message::StatusRequest).await.unwrap_err();
        assert!(err.is_peer_unreachable());
    }

    #[tokio::test]
    async fn test_silent_peer_times_out() {
        let client = NetworkClient::new(Duration::from_millis(200), Duration::from_millis(100));

        // Accepts connections but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let _holder = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let err = client
            .send(&address, Message::HandleCommunication { node_id: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionTimeout(_)));
    }
}
