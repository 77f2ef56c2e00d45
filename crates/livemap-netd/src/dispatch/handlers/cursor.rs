use livemap_editor::RefreshCause;
use livemap_netproto::types::LiveCursor;

use crate::broadcast::{broadcast_client_list, broadcast_cursor};
use crate::dispatch::HandlerContext;
use crate::dispatch::error::HandlerResult;
use crate::peer::Peer;

pub(crate) async fn handle(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    mut cursor: LiveCursor,
) -> HandlerResult {
    // Whatever id the client put in is replaced by the one it was assigned.
    cursor.client_id = peer.require_active()?;

    if ctx.registry.set_color(cursor.client_id, cursor.color) {
        ctx.observer.on_client_list(&ctx.registry.entries());
        ctx.lagging.extend(broadcast_client_list(ctx.registry));
    }

    broadcast_cursor(ctx.registry, cursor);
    ctx.observer.on_refresh(RefreshCause::Cursor(cursor));
    Ok(())
}
