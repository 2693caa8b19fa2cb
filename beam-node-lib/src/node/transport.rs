//! Length-prefixed framing over any duplex byte stream. Mirrors the real
//! distribution protocol's own framing (a u32 big-endian length, `0` for a
//! TICK) so the wire shapes in [`super::connection`] line up with what a
//! genuine BEAM peer sends.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::etf::Buffer;

use super::error::NodeError;

/// Erases the concrete stream type (`TcpStream` in production, an in-memory
/// duplex pipe in tests) behind one boxable trait, the same shape the
/// reverse-proxy side of this codebase uses for its client/upstream
/// sockets.
pub(crate) trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> IoStream for T {}

pub(crate) type BoxedIo = Box<dyn IoStream>;

pub(crate) struct FrameReader {
    io: ReadHalf<BoxedIo>,
}

pub(crate) struct FrameWriter {
    io: WriteHalf<BoxedIo>,
}

pub(crate) fn split(io: BoxedIo) -> (FrameReader, FrameWriter) {
    let (r, w) = tokio::io::split(io);
    (FrameReader { io: r }, FrameWriter { io: w })
}

impl FrameReader {
    /// Read the next frame. `Ok(None)` is a TICK (the zero-length frame).
    pub(crate) async fn read_frame(&mut self) -> Result<Option<Buffer>, NodeError> {
        let mut len_buf = [0u8; 4];
        self.io
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| NodeError::ReceiveFailed(e.to_string()))?;
        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 {
            return Ok(None);
        }
        let mut payload = vec![0u8; len];
        self.io
            .read_exact(&mut payload)
            .await
            .map_err(|e| NodeError::ReceiveFailed(e.to_string()))?;
        Ok(Some(Buffer::from_bytes(payload)))
    }
}

impl FrameWriter {
    pub(crate) async fn write_frame(&mut self, payload: &[u8]) -> Result<(), NodeError> {
        let len = u32::try_from(payload.len())
            .map_err(|_| NodeError::SendFailed("frame exceeds u32::MAX bytes".into()))?;
        self.io
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| NodeError::SendFailed(e.to_string()))?;
        self.io
            .write_all(payload)
            .await
            .map_err(|e| NodeError::SendFailed(e.to_string()))?;
        Ok(())
    }

    pub(crate) async fn write_tick(&mut self) -> Result<(), NodeError> {
        self.io
            .write_all(&0u32.to_be_bytes())
            .await
            .map_err(|e| NodeError::SendFailed(e.to_string()))
    }
}
