//! Live map session server.
//!
//! Network tasks decode packets and hand them to [`LiveServer::run`] as
//! [`InboundEvent`]s. The run loop is the only place that touches peer,
//! registry and editor state.

use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;

use livemap_editor::{LiveEditor, LiveObserver, LogLine};
use livemap_netproto::constants::{DEFAULT_CLIENT_VERSION, DEFAULT_MAX_CLIENTS};
use livemap_netproto::frame::ReadPolicy;
use livemap_netproto::types::{ClientId, Position};
use livemap_netproto::{ClientPacket, NodeKey, ServerPacket};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::broadcast::Lagging;
use crate::dispatch::HandlerContext;
use crate::dispatch::handlers::dispatch_packet;
use crate::net::inbound::{ConnId, InboundEvent};
use crate::net::outbound::{OutboundTx, send_packet};
use crate::peer::Peer;
use crate::registry::SessionRegistry;

// Export modules publicly for testing
pub mod broadcast;
pub mod dispatch;
pub mod net;
pub mod peer;
pub mod registry;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Password every client must present. Empty means none.
    pub password: String,
    /// Size of the client id pool.
    pub max_clients: u32,
    /// Asset version clients must be running.
    pub client_version: u32,
    pub read_policy: ReadPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            max_clients: DEFAULT_MAX_CLIENTS,
            client_version: DEFAULT_CLIENT_VERSION,
            read_policy: ReadPolicy::default(),
        }
    }
}

/// Requests from the hosting application.
#[derive(Debug, Clone)]
pub enum ServerCommand {
    StartOperation(String),
    UpdateOperation(u32),
    /// Chat line from the host.
    Say { speaker: String, message: String },
    /// Pushes the host's own edits at these positions to clients.
    BroadcastTiles(Vec<Position>),
    Kick { client_id: ClientId, reason: String },
    Shutdown,
}

pub struct LiveServer<E, O> {
    config: ServerConfig,
    editor: E,
    observer: O,
    registry: SessionRegistry,
    peers: HashMap<ConnId, Peer>,
    /// Connections whose outbound queue overflowed, closed after each event.
    lagging: Lagging,
}

impl<E: LiveEditor, O: LiveObserver> LiveServer<E, O> {
    pub fn new(config: ServerConfig, editor: E, observer: O) -> Self {
        let registry = SessionRegistry::new(config.max_clients);
        Self {
            config,
            editor,
            observer,
            registry,
            peers: HashMap::new(),
            lagging: Lagging::new(),
        }
    }

    /// Run the server main loop until the inbound channel closes or a
    /// [`ServerCommand::Shutdown`] arrives. Returns the editor and observer.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<InboundEvent>,
        mut commands: mpsc::Receiver<ServerCommand>,
    ) -> anyhow::Result<(E, O)> {
        let mut commands_open = true;
        info!(max_clients = self.config.max_clients, "Live server loop started");

        loop {
            tokio::select! {
                ev = rx.recv() => {
                    let Some(ev) = ev else {
                        break;
                    };
                    match ev {
                        InboundEvent::Connected {
                            conn_id,
                            peer,
                            outbound,
                            cancel_token,
                        } => self.handle_connected(conn_id, peer, outbound, cancel_token),

                        InboundEvent::Packet {
                            conn_id,
                            packet,
                            ..
                        } => self.handle_packet(conn_id, packet).await,

                        InboundEvent::Disconnected {
                            conn_id,
                            reason,
                            ..
                        } => self.close_peer(conn_id, &reason),
                    }
                }
                cmd = commands.recv(), if commands_open => {
                    match cmd {
                        Some(ServerCommand::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd),
                        None => commands_open = false,
                    }
                }
            }
            self.close_lagging();
        }

        let conn_ids: Vec<ConnId> = self.peers.keys().copied().collect();
        for conn_id in conn_ids {
            self.close_peer(conn_id, "server shutting down");
        }
        self.lagging.clear();
        info!("Live server loop stopped");
        Ok((self.editor, self.observer))
    }

    fn handle_connected(
        &mut self,
        conn_id: ConnId,
        addr: SocketAddr,
        outbound: OutboundTx,
        cancel_token: CancellationToken,
    ) {
        self.peers
            .insert(conn_id, Peer::new(conn_id, addr, outbound, cancel_token));
        debug!(conn_id, peer = %addr, "Client connected");
    }

    async fn handle_packet(&mut self, conn_id: ConnId, packet: ClientPacket) {
        let Some(peer) = self.peers.get_mut(&conn_id) else {
            // Already closed; the reader may still flush a few packets.
            return;
        };

        let mut ctx = HandlerContext {
            config: &self.config,
            registry: &mut self.registry,
            editor: &mut self.editor,
            observer: &mut self.observer,
            lagging: &mut self.lagging,
        };

        let Err(e) = dispatch_packet(peer, &mut ctx, packet).await else {
            return;
        };

        if let Some(reason) = e.kick_reason() {
            let _ = send_packet(&peer.outbound, &ServerPacket::Kick(reason.to_string()));
        }
        warn!(conn_id, peer = %peer.display_name(), error = %e, "Closing peer");
        self.close_peer(conn_id, &e.to_string());
    }

    /// Closes every connection that could not keep up. Closing one may push a
    /// client list that overflows another, so this runs until none are left.
    fn close_lagging(&mut self) {
        while let Some(conn_id) = self.lagging.pop() {
            if self.peers.contains_key(&conn_id) {
                warn!(conn_id, "Client is not reading, closing");
                self.close_peer(conn_id, "outbound queue full");
            }
        }
    }

    /// Closes a peer once; later calls for the same connection are no-ops.
    fn close_peer(&mut self, conn_id: ConnId, reason: &str) {
        let Some(mut peer) = self.peers.remove(&conn_id) else {
            return;
        };
        if !peer.close() {
            return;
        }

        if peer.client_id != 0 && self.registry.unregister(peer.client_id).is_some() {
            self.observer
                .on_log(LogLine::Message(format!("{} disconnected.", peer.name)));
            self.observer.on_client_list(&self.registry.entries());
            let lagging = broadcast::broadcast_client_list(&self.registry);
            self.lagging.extend(lagging);
        }
        info!(
            conn_id,
            client_id = peer.client_id,
            peer = %peer.addr,
            %reason,
            "Client disconnected"
        );
    }

    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::StartOperation(name) => {
                self.observer
                    .on_status(&format!("Operation in progress: {name}..."));
                let recipients = self.registry.recipients_except(None);
                let lagging =
                    broadcast::broadcast_required(&recipients, &ServerPacket::StartOperation(name));
                self.lagging.extend(lagging);
            }
            ServerCommand::UpdateOperation(percent) => {
                let recipients = self.registry.recipients_except(None);
                let lagging = broadcast::broadcast_required(
                    &recipients,
                    &ServerPacket::UpdateOperation(percent),
                );
                self.lagging.extend(lagging);
            }
            ServerCommand::Say { speaker, message } => {
                let lagging = broadcast::broadcast_chat(&self.registry, &speaker, &message, None);
                self.lagging.extend(lagging);
                self.observer.on_log(LogLine::Chat {
                    speaker,
                    text: message,
                });
            }
            ServerCommand::BroadcastTiles(positions) => {
                let keys: BTreeSet<NodeKey> =
                    positions.into_iter().map(NodeKey::containing).collect();
                let lagging =
                    broadcast::broadcast_nodes(&self.registry, self.editor.map_mut(), &keys, None);
                self.lagging.extend(lagging);
            }
            ServerCommand::Kick { client_id, reason } => {
                let Some(client) = self.registry.get(client_id) else {
                    warn!(client_id, "Kick for unknown client");
                    return;
                };
                let conn_id = client.conn_id;
                let _ = send_packet(&client.outbound, &ServerPacket::Kick(reason.clone()));
                self.close_peer(conn_id, &format!("kicked: {reason}"));
            }
            ServerCommand::Shutdown => {}
        }
    }
}

/// Run a server over the given channels with a fresh registry.
pub async fn run_server<E: LiveEditor, O: LiveObserver>(
    rx: mpsc::Receiver<InboundEvent>,
    commands: mpsc::Receiver<ServerCommand>,
    config: ServerConfig,
    editor: E,
    observer: O,
) -> anyhow::Result<(E, O)> {
    LiveServer::new(config, editor, observer)
        .run(rx, commands)
        .await
}
