use livemap_netproto::{NodeKey, ServerPacket};
use tracing::debug;

use crate::dispatch::HandlerContext;
use crate::dispatch::error::HandlerResult;
use crate::net::outbound::{FrameBatch, OutboundError, send_frame};
use crate::peer::Peer;

/// Answers each requested key with one node packet. Replies are packed
/// back to back so a large request costs few queue slots.
pub(crate) async fn handle(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    keys: Vec<NodeKey>,
) -> HandlerResult {
    let client_id = peer.require_active()?;
    debug!(client_id, count = keys.len(), "Node request");

    let mut batch = FrameBatch::new();
    for key in keys {
        let tiles = ctx.editor.map_mut().node_tiles(key);
        ctx.registry.remember_node(client_id, key);
        batch
            .push(&ServerPacket::Node { key, tiles })
            .map_err(OutboundError::from)?;
    }
    for frame in batch.finish().map_err(OutboundError::from)? {
        send_frame(&peer.outbound, frame)?;
    }
    Ok(())
}
