//! Server-side state of one accepted connection.

use std::net::SocketAddr;

use livemap_netproto::types::ClientId;
use tokio_util::sync::CancellationToken;

use crate::dispatch::error::HandlerError;
use crate::net::inbound::ConnId;
use crate::net::outbound::OutboundTx;

/// Login progress of a peer.
///
/// `Connected` → `LoggingIn` (hello accepted) or `VersionMismatchSent`
/// (awaiting a fresh hello) → `Active` (registered) → `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerState {
    #[default]
    Connected,
    VersionMismatchSent,
    LoggingIn,
    Active,
    Closed,
}

#[derive(Debug)]
pub struct Peer {
    pub conn_id: ConnId,
    pub addr: SocketAddr,
    pub state: PeerState,
    /// `0` until the registry assigns an id.
    pub client_id: ClientId,
    pub name: String,
    pub outbound: OutboundTx,
    cancel_token: CancellationToken,
}

impl Peer {
    pub fn new(
        conn_id: ConnId,
        addr: SocketAddr,
        outbound: OutboundTx,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            conn_id,
            addr,
            state: PeerState::Connected,
            client_id: 0,
            name: String::new(),
            outbound,
            cancel_token,
        }
    }

    /// Returns the assigned id if the peer finished logging in.
    pub fn require_active(&self) -> Result<ClientId, HandlerError> {
        match self.state {
            PeerState::Active => Ok(self.client_id),
            state => Err(HandlerError::Violation(format!(
                "editor packet while {state:?}"
            ))),
        }
    }

    /// Display name for log lines, falling back to the address before hello.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.addr.to_string()
        } else {
            self.name.clone()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state == PeerState::Closed
    }

    /// Stops the reader. Returns `false` if the peer was already closed.
    pub fn close(&mut self) -> bool {
        if self.is_closed() {
            return false;
        }
        self.state = PeerState::Closed;
        self.cancel_token.cancel();
        true
    }
}
