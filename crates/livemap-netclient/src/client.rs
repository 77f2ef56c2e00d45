//! UI-facing handle of a live session.

use std::sync::Arc;

use livemap_netproto::constants::UNASSIGNED_CURSOR_ID;
use livemap_netproto::types::{Color, LiveCursor, Position, TileRecord};
use livemap_netproto::{ClientPacket, NodeKey};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::engine::{ClientCommand, ClientEngine, ClientState};
use crate::error::LiveClientError;
use crate::pending::PendingNodeRequests;
use crate::session::UpdatePump;
use crate::transport::TransportService;

/// Start a live session on `transport`.
///
/// Fails with [`LiveClientError::AlreadyConnecting`] while a previous session
/// on the same transport has not reached `Closed`. Everything after this call
/// is reported through the returned [`UpdatePump`].
pub fn connect(
    transport: &TransportService,
    config: ClientConfig,
) -> Result<(LiveClientHandle, UpdatePump), LiveClientError> {
    let attempt = transport.try_begin_attempt()?;

    let state = Arc::new(Mutex::new(ClientState::Disconnected));
    let (update_tx, update_rx) = crossbeam_channel::unbounded();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let engine = ClientEngine::new(
        config,
        Arc::clone(&state),
        update_tx,
        cmd_rx,
        cancel.clone(),
        attempt,
    );
    transport.handle().spawn(engine.run());

    Ok((
        LiveClientHandle {
            state,
            commands: cmd_tx,
            pending: PendingNodeRequests::new(),
            cancel,
        },
        UpdatePump::new(update_rx),
    ))
}

/// Commands for a running session. Dropping the handle closes the session.
pub struct LiveClientHandle {
    state: Arc<Mutex<ClientState>>,
    commands: mpsc::UnboundedSender<ClientCommand>,
    pending: PendingNodeRequests,
    cancel: CancellationToken,
}

impl LiveClientHandle {
    pub fn state(&self) -> ClientState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == ClientState::Active
    }

    /// Queues the node holding tile `(x, y)`. Returns false if it was already queued.
    pub fn query_node(&self, x: u16, y: u16, underground: bool) -> bool {
        self.pending.insert(NodeKey::for_tile(x, y, underground))
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Sends every queued key in one request. Returns the number of keys sent.
    ///
    /// Keys stay queued if the session is not active yet.
    pub fn flush_node_requests(&self) -> Result<usize, LiveClientError> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        if !self.is_active() {
            return Err(LiveClientError::NotConnected);
        }

        let keys = self.pending.take();
        let count = keys.len();
        if let Err(e) = self.send(ClientPacket::NodeRequest(keys.clone())) {
            self.pending.restore(keys);
            return Err(e);
        }
        debug!(count, "Flushed node requests");
        Ok(count)
    }

    /// Sends local edits as one change list.
    pub fn send_changes(&self, tiles: Vec<TileRecord>) -> Result<(), LiveClientError> {
        if tiles.is_empty() {
            return Ok(());
        }
        self.send_active(ClientPacket::ChangeList(tiles))
    }

    pub fn update_cursor(&self, position: Position, color: Color) -> Result<(), LiveClientError> {
        self.send_active(ClientPacket::CursorUpdate(LiveCursor {
            client_id: UNASSIGNED_CURSOR_ID,
            color,
            position,
        }))
    }

    pub fn send_chat(&self, message: impl Into<String>) -> Result<(), LiveClientError> {
        self.send_active(ClientPacket::Talk(message.into()))
    }

    /// Ends the session at whatever stage it is in.
    pub fn close(&self) {
        let _ = self.commands.send(ClientCommand::Close);
        self.cancel.cancel();
    }

    fn send_active(&self, packet: ClientPacket) -> Result<(), LiveClientError> {
        if !self.is_active() {
            return Err(LiveClientError::NotConnected);
        }
        self.send(packet)
    }

    fn send(&self, packet: ClientPacket) -> Result<(), LiveClientError> {
        self.commands
            .send(ClientCommand::Send(packet))
            .map_err(|_| LiveClientError::ChannelSend)
    }
}

impl Drop for LiveClientHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
