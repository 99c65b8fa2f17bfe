//! Message framing for length-prefixed protocol
//!
//! Format: [4 bytes little-endian length][payload]

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::game::constants::net::MAX_MESSAGE_SIZE;

/// Errors that can occur during message framing
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Message too large: {0} bytes (max {1})")]
    MessageTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Read a length-prefixed message from a stream
pub async fn read_message<R: AsyncRead + Unpin>(stream: &mut R) -> Result<Vec<u8>, FramingError> {
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            return Err(FramingError::ConnectionClosed);
        }
        Err(e) => return Err(FramingError::Io(e)),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(len, MAX_MESSAGE_SIZE));
    }
    if len == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; len];
    match stream.read_exact(&mut buf).await {
        Ok(_) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FramingError::ConnectionClosed),
        Err(e) => Err(FramingError::Io(e)),
    }
}

/// Write a length-prefixed message to a stream
pub async fn write_message<W: AsyncWrite + Unpin>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), FramingError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(FramingError::MessageTooLarge(data.len(), MAX_MESSAGE_SIZE));
    }

    let len_bytes = (data.len() as u32).to_le_bytes();
    stream.write_all(&len_bytes).await?;
    stream.write_all(data).await?;
    stream.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        write_message(&mut client, b"hello").await.unwrap();
        write_message(&mut client, b"").await.unwrap();

        assert_eq!(read_message(&mut server).await.unwrap(), b"hello");
        assert!(read_message(&mut server).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(matches!(
            read_message(&mut server).await,
            Err(FramingError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_closed() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&10u32.to_le_bytes()).await.unwrap();
        client.write_all(b"abc").await.unwrap();
        drop(client);
        assert!(matches!(
            read_message(&mut server).await,
            Err(FramingError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let len = (MAX_MESSAGE_SIZE as u32 + 1).to_le_bytes();
        client.write_all(&len).await.unwrap();
        assert!(matches!(
            read_message(&mut server).await,
            Err(FramingError::MessageTooLarge(_, _))
        ));
    }

    #[tokio::test]
    async fn test_oversized_write_rejected() {
        let (mut client, _server) = tokio::io::duplex(64);
        let data = vec![0u8; MAX_MESSAGE_SIZE + 1];
        assert!(matches!(
            write_message(&mut client, &data).await,
            Err(FramingError::MessageTooLarge(_, _))
        ));
    }
}
