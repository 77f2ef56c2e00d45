use livemap_editor::LogLine;

use crate::broadcast::broadcast_chat;
use crate::dispatch::HandlerContext;
use crate::dispatch::error::HandlerResult;
use crate::peer::Peer;

pub(crate) async fn handle(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    text: String,
) -> HandlerResult {
    let client_id = peer.require_active()?;
    let lagging = broadcast_chat(ctx.registry, &peer.name, &text, Some(client_id));
    ctx.lagging.extend(lagging);
    ctx.observer.on_log(LogLine::Chat {
        speaker: peer.name.clone(),
        text,
    });
    Ok(())
}
