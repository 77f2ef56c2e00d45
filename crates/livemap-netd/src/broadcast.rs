//! Fan-out of session notifications to registered clients.
//!
//! Nothing here waits for queue space. Reliable fan-outs return the
//! connections whose queue was full; the server loop closes those.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use livemap_editor::LiveMap;
use livemap_netproto::types::{ClientId, LiveCursor};
use livemap_netproto::{NodeKey, ServerPacket, WirePacket};
use tracing::{error, trace, warn};

use crate::net::inbound::ConnId;
use crate::net::outbound::{FrameBatch, OutboundError, Recipient, send_frame};
use crate::registry::SessionRegistry;

/// Connections that could not keep up with a fan-out.
pub type Lagging = Vec<ConnId>;

fn build_frame(packet: &ServerPacket) -> Option<Bytes> {
    match packet.to_frame() {
        Ok(f) => Some(f),
        Err(e) => {
            error!(packet = ?packet.id(), "Failed to encode broadcast: {}", e);
            None
        }
    }
}

/// Returns `false` once the recipient can take no more frames.
fn deliver(recipient: &Recipient, frame: Bytes, lagging: &mut Lagging) -> bool {
    match send_frame(&recipient.tx, frame) {
        Ok(()) => true,
        Err(OutboundError::Full) => {
            warn!(conn_id = recipient.conn_id, "Outbound queue full");
            lagging.push(recipient.conn_id);
            false
        }
        // The connection task is already going away.
        Err(_) => false,
    }
}

/// Reliable fan-out: a recipient whose queue is full is reported back.
pub fn broadcast_required(recipients: &[Recipient], packet: &ServerPacket) -> Lagging {
    let mut lagging = Lagging::new();
    if let Some(frame) = build_frame(packet) {
        for recipient in recipients {
            deliver(recipient, frame.clone(), &mut lagging);
        }
    }
    lagging
}

/// Best-effort fan-out: drops the frame for any recipient whose queue is full.
pub fn broadcast_optional(recipients: &[Recipient], packet: &ServerPacket) {
    if let Some(frame) = build_frame(packet) {
        for recipient in recipients {
            let _ = recipient.tx.try_send(frame.clone());
        }
    }
}

pub fn broadcast_client_list(registry: &SessionRegistry) -> Lagging {
    let packet = ServerPacket::ClientList(registry.entries());
    broadcast_required(&registry.recipients_except(None), &packet)
}

pub fn broadcast_cursor(registry: &SessionRegistry, cursor: LiveCursor) {
    let recipients = registry.recipients_except(Some(cursor.client_id));
    broadcast_optional(&recipients, &ServerPacket::CursorUpdate(cursor));
}

pub fn broadcast_chat(
    registry: &SessionRegistry,
    speaker: &str,
    message: &str,
    except: Option<ClientId>,
) -> Lagging {
    let packet = ServerPacket::ServerTalk {
        speaker: speaker.to_string(),
        message: message.to_string(),
    };
    broadcast_required(&registry.recipients_except(except), &packet)
}

/// Re-serializes each node and pushes it to the clients that know it.
///
/// Each recipient gets its nodes packed into as few frames as possible.
pub fn broadcast_nodes(
    registry: &SessionRegistry,
    map: &mut dyn LiveMap,
    keys: &BTreeSet<NodeKey>,
    except: Option<ClientId>,
) -> Lagging {
    let mut batches: BTreeMap<ConnId, (Recipient, FrameBatch)> = BTreeMap::new();
    for key in keys {
        let recipients = registry.recipients_knowing(*key, except);
        if recipients.is_empty() {
            continue;
        }
        let packet = ServerPacket::Node {
            key: *key,
            tiles: map.node_tiles(*key),
        };
        for recipient in recipients {
            let (_, batch) = batches
                .entry(recipient.conn_id)
                .or_insert_with(|| (recipient, FrameBatch::new()));
            if let Err(e) = batch.push(&packet) {
                error!(key = key.raw(), "Failed to encode node update: {}", e);
            }
        }
    }

    let mut lagging = Lagging::new();
    for (recipient, batch) in batches.into_values() {
        let frames = match batch.finish() {
            Ok(frames) => frames,
            Err(e) => {
                error!(conn_id = recipient.conn_id, "Failed to encode node update: {}", e);
                continue;
            }
        };
        trace!(conn_id = recipient.conn_id, frames = frames.len(), "pushing node update");
        for frame in frames {
            if !deliver(&recipient, frame, &mut lagging) {
                break;
            }
        }
    }
    lagging
}

#[cfg(test)]
mod tests {
    use livemap_netproto::types::Color;
    use tokio::sync::mpsc;

    use super::*;

    fn recipient(conn_id: ConnId, depth: usize) -> (Recipient, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(depth);
        (Recipient { conn_id, tx }, rx)
    }

    #[test]
    fn full_recipient_is_reported_and_others_still_served() {
        let (slow, _slow_rx) = recipient(1, 1);
        let (fast, mut fast_rx) = recipient(2, 8);
        let packet = ServerPacket::UpdateOperation(10);

        assert!(broadcast_required(&[slow.clone(), fast.clone()], &packet).is_empty());
        let lagging = broadcast_required(&[slow, fast], &packet);
        assert_eq!(lagging, vec![1]);
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());
    }

    #[test]
    fn closed_recipient_is_not_reported() {
        let (gone, rx) = recipient(3, 1);
        drop(rx);
        assert!(broadcast_required(&[gone], &ServerPacket::UpdateOperation(1)).is_empty());
    }

    #[test]
    fn optional_fan_out_drops_when_full() {
        let (slow, mut rx) = recipient(1, 1);
        let cursor = LiveCursor {
            client_id: 9,
            color: Color::rgb(1, 2, 3),
            position: Default::default(),
        };
        broadcast_optional(&[slow.clone()], &ServerPacket::CursorUpdate(cursor));
        broadcast_optional(&[slow], &ServerPacket::CursorUpdate(cursor));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
