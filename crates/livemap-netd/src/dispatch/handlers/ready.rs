use livemap_editor::LogLine;
use livemap_netproto::{MapInfo, ServerPacket};
use tracing::{info, warn};

use crate::broadcast::broadcast_client_list;
use crate::dispatch::HandlerContext;
use crate::dispatch::error::{HandlerError, HandlerResult};
use crate::net::outbound::send_packet;
use crate::peer::{Peer, PeerState};

pub(crate) async fn handle(peer: &mut Peer, ctx: &mut HandlerContext<'_>) -> HandlerResult {
    if peer.state != PeerState::LoggingIn {
        return Err(HandlerError::Violation(format!(
            "ready while {:?}",
            peer.state
        )));
    }

    let Some(client_id) = ctx
        .registry
        .register(peer.conn_id, &peer.name, peer.outbound.clone())
    else {
        warn!(conn_id = peer.conn_id, name = %peer.name, "Rejected login: server full");
        return Err(HandlerError::server_full());
    };
    peer.client_id = client_id;
    peer.state = PeerState::Active;

    let info = {
        let map = ctx.editor.map();
        MapInfo {
            name: map.name().to_string(),
            width: map.width(),
            height: map.height(),
        }
    };
    send_packet(&peer.outbound, &ServerPacket::HelloFromServer(info))?;

    info!(conn_id = peer.conn_id, client_id, name = %peer.name, "Client joined");
    ctx.observer
        .on_log(LogLine::Message(format!("{} connected.", peer.name)));
    ctx.observer.on_client_list(&ctx.registry.entries());
    ctx.lagging.extend(broadcast_client_list(ctx.registry));
    Ok(())
}
