//! Client connection lifecycle.
//!
//! One [`ClientEngine`] drives one session from name resolution to
//! `Closed`. It owns the connection and reports everything the UI needs as
//! [`LiveUpdate`]s.

use std::sync::Arc;

use livemap_netproto::constants::{APP_VERSION_ID, NET_VERSION};
use livemap_netproto::{ClientPacket, Hello, ServerPacket, WirePacket};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::LiveClientError;
use crate::session::LiveUpdate;
use crate::tcp_client::{TcpClientEvent, TcpConnection, connect_candidates, resolve};
use crate::transport::AttemptGuard;

const EVENT_QUEUE: usize = 256;

/// Connection lifecycle of a live client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientState {
    #[default]
    Disconnected,
    Resolving,
    Connecting,
    HelloSent,
    AwaitingServerResponse,
    VersionMismatch,
    ReloadingAssets,
    Active,
    /// Terminal. A new engine is needed to reconnect.
    Closed,
}

impl ClientState {
    /// Whether `packet` may arrive in this state.
    pub fn accepts(self, packet: &ServerPacket) -> bool {
        match self {
            ClientState::AwaitingServerResponse => matches!(
                packet,
                ServerPacket::Accepted | ServerPacket::VersionMismatch(_) | ServerPacket::Kick(_)
            ),
            ClientState::Active => !matches!(
                packet,
                ServerPacket::Accepted | ServerPacket::VersionMismatch(_)
            ),
            _ => false,
        }
    }
}

/// Requests from the UI-facing handle.
#[derive(Debug)]
pub(crate) enum ClientCommand {
    Send(ClientPacket),
    Close,
}

pub(crate) struct ClientEngine {
    config: ClientConfig,
    state: Arc<Mutex<ClientState>>,
    updates: crossbeam_channel::Sender<LiveUpdate>,
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    cancel: CancellationToken,
    attempt: Option<AttemptGuard>,
}

impl ClientEngine {
    pub(crate) fn new(
        config: ClientConfig,
        state: Arc<Mutex<ClientState>>,
        updates: crossbeam_channel::Sender<LiveUpdate>,
        commands: mpsc::UnboundedReceiver<ClientCommand>,
        cancel: CancellationToken,
        attempt: AttemptGuard,
    ) -> Self {
        Self {
            config,
            state,
            updates,
            commands,
            cancel,
            attempt: Some(attempt),
        }
    }

    fn state(&self) -> ClientState {
        *self.state.lock()
    }

    fn set_state(&self, next: ClientState) {
        let prev = std::mem::replace(&mut *self.state.lock(), next);
        debug!(from = ?prev, to = ?next, "Client state");
    }

    fn post(&self, update: LiveUpdate) {
        if self.updates.send(update).is_err() {
            debug!("Update pump dropped");
        }
    }

    /// Run the session to completion.
    pub(crate) async fn run(mut self) {
        let reason = match self.session().await {
            Ok(reason) => reason,
            Err(e) => {
                warn!(error = %e, "Live session ended");
                e.to_string()
            }
        };

        // Free the transport before anyone can observe `Closed`.
        drop(self.attempt.take());
        self.set_state(ClientState::Closed);
        self.post(LiveUpdate::Closed { reason });
    }

    async fn session(&mut self) -> Result<String, LiveClientError> {
        let cancel = self.cancel.clone();

        self.set_state(ClientState::Resolving);
        let candidates = tokio::select! {
            res = resolve(&self.config.host, self.config.port) => res?,
            _ = cancel.cancelled() => return Ok(closed_locally()),
        };

        self.set_state(ClientState::Connecting);
        let (stream, addr) = tokio::select! {
            res = connect_candidates(&candidates, self.config.connect_timeout) => res?,
            _ = cancel.cancelled() => return Ok(closed_locally()),
        };
        info!(%addr, name = %self.config.name, "Connected, logging in");

        let (event_tx, mut event_rx) = mpsc::channel(EVENT_QUEUE);
        let conn = TcpConnection::spawn(stream, self.config.read_policy, event_tx)?;
        let result = self.exchange(&conn, &mut event_rx).await;
        conn.shutdown().await;
        result
    }

    async fn exchange(
        &mut self,
        conn: &TcpConnection,
        events: &mut mpsc::Receiver<TcpClientEvent>,
    ) -> Result<String, LiveClientError> {
        let cancel = self.cancel.clone();

        self.send_hello(conn, self.config.client_version).await?;
        self.set_state(ClientState::AwaitingServerResponse);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(closed_locally()),

                event = events.recv() => {
                    match event {
                        Some(TcpClientEvent::Packet(packet)) => {
                            self.handle_packet(conn, packet).await?;
                        }
                        Some(TcpClientEvent::Disconnected { reason }) => {
                            self.post(LiveUpdate::Disconnected { remote: conn.peer() });
                            return Err(LiveClientError::ConnectionLost(reason));
                        }
                        None => {
                            return Err(LiveClientError::ConnectionLost(
                                "reader stopped".to_string(),
                            ));
                        }
                    }
                }

                cmd = self.commands.recv() => {
                    match cmd {
                        Some(ClientCommand::Send(packet)) => self.send_command(conn, packet).await?,
                        Some(ClientCommand::Close) | None => return Ok(closed_locally()),
                    }
                }
            }
        }
    }

    async fn send_hello(
        &self,
        conn: &TcpConnection,
        client_version: u32,
    ) -> Result<(), LiveClientError> {
        conn.send(&ClientPacket::Hello(Hello {
            app_version: APP_VERSION_ID,
            net_version: NET_VERSION,
            client_version,
            name: self.config.name.clone(),
            password: self.config.password.clone(),
        }))
        .await?;
        self.set_state(ClientState::HelloSent);
        Ok(())
    }

    async fn send_command(
        &self,
        conn: &TcpConnection,
        packet: ClientPacket,
    ) -> Result<(), LiveClientError> {
        let state = self.state();
        if state != ClientState::Active {
            warn!(packet = ?packet.id(), ?state, "Dropping packet sent before login finished");
            return Ok(());
        }
        conn.send(&packet).await
    }

    async fn handle_packet(
        &mut self,
        conn: &TcpConnection,
        packet: ServerPacket,
    ) -> Result<(), LiveClientError> {
        let state = self.state();
        if !state.accepts(&packet) {
            return Err(LiveClientError::Violation {
                packet: format!("{:?}", packet.id()),
                state: format!("{state:?}"),
            });
        }

        match packet {
            ServerPacket::Accepted => {
                conn.send(&ClientPacket::Ready).await?;
                self.set_state(ClientState::Active);
                self.post(LiveUpdate::Log("Connected to live server.".to_string()));
            }
            ServerPacket::VersionMismatch(version) => {
                self.reload_assets(conn, version).await?;
            }
            ServerPacket::Kick(reason) => return Err(LiveClientError::Kicked(reason)),
            ServerPacket::HelloFromServer(info) => {
                info!(map = %info.name, width = info.width, height = info.height, "Joined live map");
                self.post(LiveUpdate::MapInfo(info));
            }
            ServerPacket::Node { key, tiles } => self.post(LiveUpdate::Node { key, tiles }),
            ServerPacket::CursorUpdate(cursor) => self.post(LiveUpdate::Cursor(cursor)),
            ServerPacket::ServerTalk { speaker, message } => {
                self.post(LiveUpdate::Chat { speaker, message });
            }
            ServerPacket::ClientList(clients) => self.post(LiveUpdate::ClientList(clients)),
            ServerPacket::StartOperation(name) => self.post(LiveUpdate::OperationStarted(name)),
            ServerPacket::UpdateOperation(percent) => {
                self.post(LiveUpdate::OperationProgress(percent));
            }
        }
        Ok(())
    }

    /// Has the UI switch asset versions, then logs in again with `version`.
    async fn reload_assets(
        &mut self,
        conn: &TcpConnection,
        version: u32,
    ) -> Result<(), LiveClientError> {
        self.set_state(ClientState::VersionMismatch);
        info!(
            version,
            current = self.config.client_version,
            "Server requires another client version"
        );

        let (reply, answer) = oneshot::channel();
        self.set_state(ClientState::ReloadingAssets);
        self.post(LiveUpdate::ReloadAssets { version, reply });

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            res = answer => res.map_err(|_| LiveClientError::ReloadAbandoned)?,
            _ = cancel.cancelled() => return Err(LiveClientError::ReloadAbandoned),
        };
        result?;

        self.config.client_version = version;
        self.send_hello(conn, version).await?;
        self.set_state(ClientState::AwaitingServerResponse);
        Ok(())
    }
}

fn closed_locally() -> String {
    "Connection closed.".to_string()
}

#[cfg(test)]
mod tests {
    use livemap_netproto::MapInfo;

    use super::*;

    #[test]
    fn handshake_accepts_only_login_replies() {
        let s = ClientState::AwaitingServerResponse;
        assert!(s.accepts(&ServerPacket::Accepted));
        assert!(s.accepts(&ServerPacket::VersionMismatch(1100)));
        assert!(s.accepts(&ServerPacket::Kick("no".into())));
        assert!(!s.accepts(&ServerPacket::ClientList(vec![])));
        assert!(!s.accepts(&ServerPacket::UpdateOperation(3)));
    }

    #[test]
    fn active_rejects_login_replies() {
        let s = ClientState::Active;
        assert!(!s.accepts(&ServerPacket::Accepted));
        assert!(!s.accepts(&ServerPacket::VersionMismatch(1)));
        assert!(s.accepts(&ServerPacket::Kick("bye".into())));
        assert!(s.accepts(&ServerPacket::HelloFromServer(MapInfo {
            name: "m".into(),
            width: 1,
            height: 1,
        })));
    }

    #[test]
    fn other_states_accept_nothing() {
        for s in [
            ClientState::Disconnected,
            ClientState::Resolving,
            ClientState::Connecting,
            ClientState::HelloSent,
            ClientState::VersionMismatch,
            ClientState::ReloadingAssets,
            ClientState::Closed,
        ] {
            assert!(!s.accepts(&ServerPacket::Accepted), "{s:?}");
            assert!(!s.accepts(&ServerPacket::Kick(String::new())), "{s:?}");
        }
    }
}
