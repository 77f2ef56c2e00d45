use livemap_netproto::PacketId;
use tracing::warn;

use crate::dispatch::error::HandlerResult;
use crate::peer::Peer;

/// House edits are accepted but not applied yet.
pub(crate) fn handle(peer: &mut Peer, kind: PacketId) -> HandlerResult {
    let client_id = peer.require_active()?;
    warn!(client_id, packet = ?kind, "House packets are not supported (ignored)");
    Ok(())
}
