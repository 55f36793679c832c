//! Length-driven framing and the serialized egress writer.

use crate::codec::{ByteOrder, Flags, HEADER_LEN};
use crate::error::{DecodeErrorKind, Error, Result};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Reads whole AgentX frames from a byte stream.
///
/// Each frame is the fixed header followed by exactly `payload_length`
/// bytes. There is no resynchronisation marker, so any framing error is
/// terminal for the stream.
pub struct FrameReader<R> {
    reader: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R, max_frame_size: usize) -> Self {
        Self {
            reader,
            max_frame_size,
        }
    }

    /// Read the next frame, header included.
    ///
    /// Returns `Ok(None)` on a clean EOF between frames. EOF inside a frame
    /// is a transport error.
    pub async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self
                .reader
                .read(&mut header[filled..])
                .await
                .map_err(|e| Error::transport(None, e))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(Error::transport(
                    None,
                    std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
                ));
            }
            filled += n;
        }

        let len_bytes: [u8; 4] = [header[16], header[17], header[18], header[19]];
        let payload_len = match ByteOrder::from_flags(Flags::from_bits(header[2])) {
            ByteOrder::Network => u32::from_be_bytes(len_bytes),
            ByteOrder::Little => u32::from_le_bytes(len_bytes),
        } as usize;

        let max_payload = self.max_frame_size.saturating_sub(HEADER_LEN);
        if payload_len > max_payload {
            return Err(Error::decode(
                HEADER_LEN - 4,
                DecodeErrorKind::LengthExceedsMax {
                    length: payload_len,
                    max: max_payload,
                },
            ));
        }

        let mut frame = BytesMut::with_capacity(HEADER_LEN + payload_len);
        frame.extend_from_slice(&header);
        frame.resize(HEADER_LEN + payload_len, 0);
        self.reader
            .read_exact(&mut frame[HEADER_LEN..])
            .await
            .map_err(|e| Error::transport(None, e))?;

        tracing::trace!(target: "async_agentx::transport", { agentx.frame_len = frame.len() }, "frame received");
        Ok(Some(frame.freeze()))
    }
}

/// Handle for queueing encoded frames to the single writer task.
#[derive(Clone)]
pub struct Egress {
    tx: mpsc::Sender<Bytes>,
}

impl Egress {
    /// Queue one complete frame. Frames are written whole and in queue order.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx.send(frame).await.map_err(|_| {
            Error::transport(
                None,
                std::io::Error::new(std::io::ErrorKind::BrokenPipe, "egress closed"),
            )
        })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create an egress queue with room for `capacity` pending frames.
pub fn egress_channel(capacity: usize) -> (Egress, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(capacity);
    (Egress { tx }, rx)
}

/// Drain the egress queue into `writer` until cancelled or every sender is gone.
///
/// Being the only task that touches the write half is what keeps frames
/// from different senders from interleaving.
pub async fn run_writer<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut rx: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let frame = tokio::select! {
            biased;
            frame = rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = cancel.cancelled() => break,
        };
        writer
            .write_all(&frame)
            .await
            .map_err(|e| Error::transport(None, e))?;
        writer.flush().await.map_err(|e| Error::transport(None, e))?;
        tracing::trace!(target: "async_agentx::transport", { agentx.frame_len = frame.len() }, "frame sent");
    }

    // Flush whatever was queued before shutdown so a final Close goes out
    while let Ok(frame) = rx.try_recv() {
        if writer.write_all(&frame).await.is_err() {
            break;
        }
    }
    let _ = writer.shutdown().await;
    Ok(())
}
