//! Network Module
//!
//! Handles request/response communication between nodes.

mod client;
mod memory;
pub mod protocol;
mod server;

pub use client::NetworkClient;
pub use memory::InMemoryTransport;
pub use protocol::{FrameHeader, Message, MAX_FRAME_SIZE};
pub use server::{MessageHandler, NetworkServer};

use crate::error::{Error, Result};

/// Outbound remote-call channel to peers
#[async_trait::async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send a request to `address` and wait for its reply
    async fn call(&self, address: &str, message: Message) -> Result<Message>;
}

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    let length = header.length as usize;
    if length > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: length,
            limit: MAX_FRAME_SIZE,
        });
    }

    // Read body
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    let computed_checksum = crc32fast::hash(&body);
    if computed_checksum != header.checksum {
        return Err(Error::Network("Message checksum mismatch".into()));
    }

    let message = Message::deserialize(&body)?;
    Ok(message)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(Error::FrameTooLarge {
            size: body.len(),
            limit: MAX_FRAME_SIZE,
        });
    }
    let header = FrameHeader::new(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}
