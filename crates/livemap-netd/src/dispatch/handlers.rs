use livemap_netproto::{ClientPacket, WirePacket};
use tracing::trace;

use super::HandlerContext;
use super::error::HandlerResult;
use crate::peer::Peer;

mod change_list;
mod chat;
mod cursor;
mod hello;
mod house;
mod node_request;
mod ready;

pub(crate) async fn dispatch_packet(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    packet: ClientPacket,
) -> HandlerResult {
    let kind = packet.id();
    trace!(conn_id = peer.conn_id, state = ?peer.state, packet = ?kind, "dispatch");
    match packet {
        ClientPacket::Hello(hello) => hello::handle(peer, ctx, hello).await,
        ClientPacket::Ready => ready::handle(peer, ctx).await,
        ClientPacket::NodeRequest(keys) => node_request::handle(peer, ctx, keys).await,
        ClientPacket::ChangeList(tiles) => change_list::handle(peer, ctx, tiles).await,
        ClientPacket::CursorUpdate(cursor) => cursor::handle(peer, ctx, cursor).await,
        ClientPacket::Talk(text) => chat::handle(peer, ctx, text).await,
        ClientPacket::AddHouse | ClientPacket::EditHouse | ClientPacket::RemoveHouse => {
            house::handle(peer, kind)
        }
    }
}
