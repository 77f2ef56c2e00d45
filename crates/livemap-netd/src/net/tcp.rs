use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use livemap_netproto::frame::{FrameReader, ReadPolicy};
use livemap_netproto::{ClientPacket, WirePacket};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::{BytesCodec, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::inbound::{ConnId, InboundEvent, next_conn_id};
use super::outbound::{OUTBOUND_QUEUE, spawn_writer};

/// How long a closing connection may spend flushing its queue.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Start a TCP listener. All decoded packets and connection events are sent to `tx`.
pub async fn run_tcp_listener(
    bind: SocketAddr,
    tx: mpsc::Sender<InboundEvent>,
    policy: ReadPolicy,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    run_tcp_listener_with_listener(listener, tx, policy).await
}

/// Run the accept loop on an existing listener.
pub async fn run_tcp_listener_with_listener(
    listener: TcpListener,
    tx: mpsc::Sender<InboundEvent>,
    policy: ReadPolicy,
) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let conn_id = next_conn_id();

        let tx_clone = tx.clone();
        tokio::spawn(async move {
            handle_tcp_connection(stream, peer, conn_id, tx_clone, policy).await;
        });
    }
}

/// Handle a single TCP connection. Public to allow embedding the server in other crates.
pub async fn handle_tcp_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn_id: ConnId,
    tx: mpsc::Sender<InboundEvent>,
    policy: ReadPolicy,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!(conn_id, %peer, error = %e, "Failed to disable Nagle, closing");
        return;
    }

    let (read, write) = stream.into_split();
    let sink = FramedWrite::new(write, BytesCodec::new());

    // Outbound queue (framed bytes).
    let (out_tx, out_rx) = mpsc::channel::<Bytes>(OUTBOUND_QUEUE);
    let mut writer = spawn_writer(sink, out_rx);

    let cancel_token = CancellationToken::new();

    // Notify upper layer that a connection is established.
    if tx
        .send(InboundEvent::Connected {
            conn_id,
            peer,
            outbound: out_tx.clone(),
            cancel_token: cancel_token.clone(),
        })
        .await
        .is_err()
    {
        return;
    }

    let mut reader = FrameReader::new(read, policy);
    let mut disconnect_reason = "eof".to_string();

    loop {
        let read_res = tokio::select! {
            res = reader.read_frame() => res,
            _ = cancel_token.cancelled() => {
                disconnect_reason = "closed by server".to_string();
                break;
            }
        };

        let payload = match read_res {
            Ok(Some(payload)) => payload,
            Ok(None) => break,
            Err(e) => {
                disconnect_reason = format!("read error: {e}");
                break;
            }
        };

        let packets = match ClientPacket::decode_frame(&payload) {
            Ok(packets) => packets,
            Err(e) => {
                // Protocol error -> close connection.
                disconnect_reason = format!("protocol error: {e}");
                break;
            }
        };

        let mut closed = false;
        for packet in packets {
            if cancel_token.is_cancelled() {
                closed = true;
                break;
            }
            // Forward decoded packets to upper layer.
            if tx
                .send(InboundEvent::Packet {
                    conn_id,
                    peer,
                    packet,
                })
                .await
                .is_err()
            {
                closed = true;
                break;
            }
        }
        if closed {
            disconnect_reason = "inbound channel closed".to_string();
            break;
        }
    }

    debug!(conn_id, %peer, reason = %disconnect_reason, "Connection task ending");

    // Notify disconnect (best-effort).
    let _ = tx
        .send(InboundEvent::Disconnected {
            conn_id,
            peer,
            reason: disconnect_reason,
        })
        .await;

    // Close outbound channel so writer can exit once the server loop lets go too.
    drop(out_tx);

    // A client that stopped reading would hold the writer forever.
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        debug!(conn_id, %peer, "Writer did not drain in time, aborting");
        writer.abort();
    }
}
