//! Length-prefixed framing over a byte stream.
//!
//! Wire formats:
//! - frame: `[u32 length (big-endian)][payload]`
//! - message: `[u32 type (big-endian)][u32 length (big-endian)][payload]`

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::{ProtocolError, ProtocolResult};

/// Default upper bound for a single frame, 16 MiB.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A typed message as read off the wire, payload still encrypted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_type: u32,
    pub payload: Vec<u8>,
}

pub struct FramedChannel<S> {
    stream: S,
    max_frame_len: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedChannel<S> {
    pub fn new(stream: S, max_frame_len: usize) -> Self {
        Self {
            stream,
            max_frame_len,
        }
    }

    /// Reads exactly `n` bytes. A peer that closes before delivering all of them
    /// yields [`ProtocolError::ConnectionClosed`], partial data is never returned.
    pub async fn read_exact(&mut self, n: usize) -> ProtocolResult<Vec<u8>> {
        let mut buf = vec![0u8; n];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ProtocolError::ConnectionClosed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read_u32(&mut self) -> ProtocolResult<u32> {
        let bytes = self.read_exact(4).await?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads a length prefix followed by that many bytes.
    pub async fn read_frame(&mut self) -> ProtocolResult<Vec<u8>> {
        let len = self.read_len().await?;
        self.read_exact(len).await
    }

    /// Reads an 8-byte `(type, length)` header followed by the payload.
    pub async fn read_message(&mut self) -> ProtocolResult<RawMessage> {
        let message_type = self.read_u32().await?;
        let len = self.read_len().await?;
        let payload = self.read_exact(len).await?;
        Ok(RawMessage {
            message_type,
            payload,
        })
    }

    /// Writes the length prefix and the payload as a single buffered write.
    pub async fn write_frame(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        let len = self.checked_len(bytes.len())?;
        let mut out = Vec::with_capacity(4 + bytes.len());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(bytes);
        self.write_all(&out).await
    }

    pub async fn write_message(&mut self, message_type: u32, payload: &[u8]) -> ProtocolResult<()> {
        let len = self.checked_len(payload.len())?;
        let mut out = Vec::with_capacity(8 + payload.len());
        out.extend_from_slice(&message_type.to_be_bytes());
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(payload);
        self.write_all(&out).await
    }

    pub async fn shutdown(&mut self) -> ProtocolResult<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn read_len(&mut self) -> ProtocolResult<usize> {
        let len = self.read_u32().await? as usize;
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge(len, self.max_frame_len));
        }
        Ok(len)
    }

    fn checked_len(&self, len: usize) -> ProtocolResult<u32> {
        if len > self.max_frame_len || len > u32::MAX as usize {
            return Err(ProtocolError::FrameTooLarge(len, self.max_frame_len));
        }
        Ok(len as u32)
    }

    async fn write_all(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
