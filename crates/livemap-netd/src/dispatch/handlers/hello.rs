use livemap_editor::LogLine;
use livemap_netproto::constants::NET_VERSION;
use livemap_netproto::{Hello, ServerPacket};
use tracing::{info, warn};

use crate::dispatch::HandlerContext;
use crate::dispatch::error::{HandlerError, HandlerResult};
use crate::net::outbound::send_packet;
use crate::peer::{Peer, PeerState};

pub(crate) async fn handle(
    peer: &mut Peer,
    ctx: &mut HandlerContext<'_>,
    hello: Hello,
) -> HandlerResult {
    match peer.state {
        PeerState::Connected | PeerState::VersionMismatchSent => {}
        state => {
            return Err(HandlerError::Violation(format!("hello while {state:?}")));
        }
    }

    if hello.net_version != NET_VERSION {
        warn!(
            conn_id = peer.conn_id,
            peer = %peer.addr,
            client_net_version = hello.net_version,
            "Rejected login: wire protocol mismatch"
        );
        return Err(HandlerError::Kick(format!(
            "Incompatible live protocol (server {NET_VERSION}, client {}).",
            hello.net_version
        )));
    }

    if hello.password != ctx.config.password {
        info!(
            conn_id = peer.conn_id,
            peer = %peer.addr,
            name = %hello.name,
            "Rejected login: wrong password"
        );
        ctx.observer.on_log(LogLine::Message(format!(
            "{} ({}) tried to connect with an incorrect password.",
            hello.name, peer.addr
        )));
        return Err(HandlerError::BadPassword);
    }

    peer.name = hello.name;

    if hello.client_version != ctx.config.client_version {
        info!(
            conn_id = peer.conn_id,
            name = %peer.name,
            client_version = hello.client_version,
            server_version = ctx.config.client_version,
            "Client version differs, asking client to switch"
        );
        send_packet(
            &peer.outbound,
            &ServerPacket::VersionMismatch(ctx.config.client_version),
        )?;
        peer.state = PeerState::VersionMismatchSent;
        return Ok(());
    }

    send_packet(&peer.outbound, &ServerPacket::Accepted)?;
    peer.state = PeerState::LoggingIn;
    info!(conn_id = peer.conn_id, name = %peer.name, "Hello accepted");
    Ok(())
}
