use livemap_editor::RefreshCause;
use livemap_editor::bridge::apply_remote_tiles;
use livemap_netproto::types::TileRecord;
use tracing::debug;

use crate::broadcast::broadcast_nodes;
use crate::dispatch::HandlerContext;
use crate::dispatch::error::HandlerResult;
use crate::peer::Peer;

/// Commits the batch as one action owned by the sender, then pushes the
/// affected nodes to every other client that has them.
pub(crate) async fn handle(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    tiles: Vec<TileRecord>,
) -> HandlerResult {
    let client_id = peer.require_active()?;

    let applied = apply_remote_tiles(ctx.editor, Some(client_id), tiles);
    if applied.is_empty() {
        return Ok(());
    }
    debug!(
        client_id,
        changes = applied.changes,
        nodes = applied.nodes.len(),
        "Change list applied"
    );

    ctx.observer.on_refresh(RefreshCause::RemoteChanges {
        owner: Some(client_id),
        changes: applied.changes,
    });
    let lagging = broadcast_nodes(
        ctx.registry,
        ctx.editor.map_mut(),
        &applied.nodes,
        Some(client_id),
    );
    ctx.lagging.extend(lagging);
    Ok(())
}
