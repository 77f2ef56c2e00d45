use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use livemap_netproto::{NetworkMessage, ProtoError, ServerPacket, WirePacket};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::inbound::ConnId;

/// Outbound channel sender type.
/// Data must already be framed (length prefix + payload).
pub type OutboundTx = mpsc::Sender<Bytes>;

/// Queue depth per connection, in frames.
pub const OUTBOUND_QUEUE: usize = 1024;

/// Payload size after which a [`FrameBatch`] starts a new frame.
pub const BATCH_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error(transparent)]
    Encode(#[from] ProtoError),
    /// The client is not draining its queue.
    #[error("outbound queue full")]
    Full,
    #[error("connection closed")]
    Closed,
}

/// One connection's outbound queue, as seen by a fan-out.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub conn_id: ConnId,
    pub tx: OutboundTx,
}

/// Spawn a writer task that drains framed bytes into the socket sink.
///
/// Exits once every sender is dropped and the queue is empty, then closes the
/// sink so the remote side observes end of stream.
pub fn spawn_writer<S>(
    mut write: S,
    mut rx: mpsc::Receiver<Bytes>,
) -> tokio::task::JoinHandle<anyhow::Result<()>>
where
    S: Sink<Bytes, Error = std::io::Error> + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            write.send(frame).await?;
        }
        write.close().await?;
        Ok(())
    })
}

/// Enqueue a framed buffer without waiting for queue space.
pub fn send_frame(tx: &OutboundTx, frame: Bytes) -> Result<(), OutboundError> {
    tx.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => OutboundError::Full,
        TrySendError::Closed(_) => OutboundError::Closed,
    })
}

/// Encode a packet into a single frame and enqueue it.
pub fn send_packet(tx: &OutboundTx, packet: &ServerPacket) -> Result<(), OutboundError> {
    send_frame(tx, packet.to_frame()?)
}

/// Packs packets back to back into as few frames as possible.
#[derive(Debug, Default)]
pub struct FrameBatch {
    frames: Vec<Bytes>,
    current: NetworkMessage,
}

impl FrameBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, packet: &ServerPacket) -> Result<(), ProtoError> {
        packet.encode(&mut self.current)?;
        if self.current.payload_len() >= BATCH_BYTES {
            self.seal()?;
        }
        Ok(())
    }

    fn seal(&mut self) -> Result<(), ProtoError> {
        let msg = std::mem::take(&mut self.current);
        self.frames.push(msg.finish()?);
        Ok(())
    }

    /// Completed frames, in push order.
    pub fn finish(mut self) -> Result<Vec<Bytes>, ProtoError> {
        if self.current.payload_len() > 0 {
            self.seal()?;
        }
        Ok(self.frames)
    }
}
