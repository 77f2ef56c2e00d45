//! Async TCP transport for a live session.
//!
//! This module provides:
//! - Name resolution into ordered candidate endpoints
//! - Connecting with fallback across candidates
//! - Reader and writer tasks around one established stream

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use livemap_netproto::frame::{FrameReader, ReadPolicy};
use livemap_netproto::{ClientPacket, ServerPacket, WirePacket};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::LiveClientError;

/// Events sent from the connection tasks to the engine.
#[derive(Debug)]
pub enum TcpClientEvent {
    /// Received a packet from the server.
    Packet(ServerPacket),
    /// The stream ended or failed.
    Disconnected { reason: String },
}

/// Commands for the writer task.
#[derive(Debug)]
pub enum TcpClientCommand {
    /// Send an already framed buffer.
    SendRaw(Bytes),
    /// Flush what is queued, then shut the socket down.
    Disconnect,
}

const COMMAND_QUEUE: usize = 256;

/// Resolves `host:port` into candidate endpoints, in resolver order.
pub async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, LiveClientError> {
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|e| LiveClientError::Resolve {
            host: host.to_string(),
            reason: e.to_string(),
        })?
        .collect();
    if addrs.is_empty() {
        return Err(LiveClientError::Resolve {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        });
    }
    Ok(addrs)
}

/// Connect failures that move on to the next candidate instead of aborting.
pub fn is_recoverable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
    )
}

/// Tries each candidate in order and returns the first established stream.
pub async fn connect_candidates(
    candidates: &[SocketAddr],
    connect_timeout: Option<Duration>,
) -> Result<(TcpStream, SocketAddr), LiveClientError> {
    let mut last_error: Option<io::Error> = None;

    for &addr in candidates {
        debug!(%addr, "Connecting");
        let attempt = TcpStream::connect(addr);
        let res = match connect_timeout {
            Some(limit) => match tokio::time::timeout(limit, attempt).await {
                Ok(res) => res,
                Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
            },
            None => attempt.await,
        };

        match res {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) if is_recoverable(&e) => {
                debug!(%addr, error = %e, "Candidate failed, trying next");
                last_error = Some(e);
            }
            Err(e) => {
                return Err(LiveClientError::ConnectionFailed(format!(
                    "Failed to connect to {addr}: {e}"
                )));
            }
        }
    }

    Err(LiveClientError::ConnectionFailed(match last_error {
        Some(e) => format!("Unable to connect to any endpoint: {e}"),
        None => "No endpoints to connect to".to_string(),
    }))
}

/// An established stream with its reader and writer tasks.
pub struct TcpConnection {
    peer: SocketAddr,
    cmd_tx: mpsc::Sender<TcpClientCommand>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl TcpConnection {
    /// Disables Nagle and starts the I/O tasks. Decoded packets go to `event_tx`.
    pub fn spawn(
        stream: TcpStream,
        policy: ReadPolicy,
        event_tx: mpsc::Sender<TcpClientEvent>,
    ) -> Result<Self, LiveClientError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        let (cmd_tx, cmd_rx) = mpsc::channel::<TcpClientCommand>(COMMAND_QUEUE);
        let cancel = CancellationToken::new();

        let event_tx_writer = event_tx.clone();
        let writer = tokio::spawn(async move {
            writer_loop(write_half, cmd_rx, event_tx_writer).await;
        });

        let reader_cancel = cancel.clone();
        let reader = tokio::spawn(async move {
            reader_loop(read_half, policy, event_tx, reader_cancel).await;
        });

        info!(%peer, "Connected to live server");
        Ok(Self {
            peer,
            cmd_tx,
            cancel,
            reader,
            writer,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues `packet` as one frame.
    pub async fn send(&self, packet: &ClientPacket) -> Result<(), LiveClientError> {
        let frame = packet.to_frame()?;
        self.cmd_tx
            .send(TcpClientCommand::SendRaw(frame))
            .await
            .map_err(|_| LiveClientError::ChannelSend)
    }

    /// Stops the reader, lets the writer drain its queue, then waits for both.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.cmd_tx.send(TcpClientCommand::Disconnect).await;
        drop(self.cmd_tx);
        let _ = self.writer.await;
        let _ = self.reader.await;
        debug!(peer = %self.peer, "Connection shut down");
    }
}

/// Writer task: receives commands and writes to the socket.
async fn writer_loop(
    mut write: impl AsyncWrite + Unpin,
    mut cmd_rx: mpsc::Receiver<TcpClientCommand>,
    event_tx: mpsc::Sender<TcpClientEvent>,
) {
    loop {
        match cmd_rx.recv().await {
            Some(TcpClientCommand::SendRaw(bytes)) => {
                trace!("Sending {} bytes to server", bytes.len());
                if let Err(e) = write.write_all(&bytes).await {
                    error!("Write error: {}", e);
                    let _ = event_tx.try_send(TcpClientEvent::Disconnected {
                        reason: format!("write error: {e}"),
                    });
                    break;
                }
            }
            Some(TcpClientCommand::Disconnect) => {
                debug!("Disconnect command received");
                break;
            }
            None => {
                debug!("Command channel closed");
                break;
            }
        }
    }

    // Attempt graceful shutdown
    let _ = write.shutdown().await;
}

/// Reader task: reads frames from the socket and forwards decoded packets.
async fn reader_loop(
    read: impl AsyncRead + Unpin,
    policy: ReadPolicy,
    event_tx: mpsc::Sender<TcpClientEvent>,
    cancel: CancellationToken,
) {
    let mut reader = FrameReader::new(read, policy);

    let reason = loop {
        let read_res = tokio::select! {
            res = reader.read_frame() => res,
            _ = cancel.cancelled() => return,
        };

        let payload = match read_res {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                info!("Server closed connection");
                break "server closed connection".to_string();
            }
            Err(e) => {
                warn!("Read error: {}", e);
                break format!("read error: {e}");
            }
        };

        let packets = match ServerPacket::decode_frame(&payload) {
            Ok(packets) => packets,
            Err(e) => {
                error!("Protocol decode error: {}", e);
                break format!("protocol error: {e}");
            }
        };

        for packet in packets {
            trace!(packet = ?packet.id(), "Received from server");
            let sent = tokio::select! {
                res = event_tx.send(TcpClientEvent::Packet(packet)) => res.is_ok(),
                _ = cancel.cancelled() => return,
            };
            if !sent {
                debug!("Event channel closed");
                return;
            }
        }
    };

    tokio::select! {
        _ = event_tx.send(TcpClientEvent::Disconnected { reason }) => {}
        _ = cancel.cancelled() => {}
    }
}
