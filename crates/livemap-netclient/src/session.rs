//! UI-side half of a live session.
//!
//! The engine never touches editor state. It posts [`LiveUpdate`]s which the
//! UI thread applies with [`UpdatePump::pump`].

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use livemap_editor::bridge::apply_remote_tiles;
use livemap_editor::{AssetLoadError, AssetLoader, LiveEditor, LiveObserver, LogLine, RefreshCause};
use livemap_netproto::types::{ClientEntry, LiveCursor, Position, TileRecord};
use livemap_netproto::{MapInfo, NodeKey};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Reply slot for an asset reload requested by the engine.
pub type ReloadReply = oneshot::Sender<Result<(), AssetLoadError>>;

/// Notifications from the engine to the UI thread.
#[derive(Debug)]
pub enum LiveUpdate {
    MapInfo(MapInfo),
    Node {
        key: NodeKey,
        tiles: Vec<TileRecord>,
    },
    Cursor(LiveCursor),
    Chat {
        speaker: String,
        message: String,
    },
    ClientList(Vec<ClientEntry>),
    OperationStarted(String),
    OperationProgress(u32),
    /// The server requires another asset version. The engine waits on `reply`.
    ReloadAssets {
        version: u32,
        reply: ReloadReply,
    },
    Log(String),
    /// The server ended the stream.
    Disconnected {
        remote: SocketAddr,
    },
    /// Final update of a session.
    Closed {
        reason: String,
    },
}

/// Last reported server operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationProgress {
    pub name: String,
    pub percent: u32,
}

impl OperationProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            percent: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.percent >= 100
    }

    pub fn status_text(&self) -> String {
        if self.is_finished() {
            "Server Operation Finished.".to_string()
        } else {
            format!(
                "Server Operation in Progress: {}... ({}%)",
                self.name, self.percent
            )
        }
    }
}

/// Drains engine updates on the UI thread.
pub struct UpdatePump {
    rx: Receiver<LiveUpdate>,
    operation: Option<OperationProgress>,
    closed: bool,
}

impl UpdatePump {
    pub(crate) fn new(rx: Receiver<LiveUpdate>) -> Self {
        Self {
            rx,
            operation: None,
            closed: false,
        }
    }

    /// Operation currently shown in the status bar.
    pub fn operation(&self) -> Option<&OperationProgress> {
        self.operation.as_ref()
    }

    /// True once the session's final update was applied.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies every queued update without blocking. Returns how many were applied.
    pub fn pump(
        &mut self,
        editor: &mut dyn LiveEditor,
        observer: &mut dyn LiveObserver,
        loader: &mut dyn AssetLoader,
    ) -> usize {
        let mut applied = 0;
        loop {
            match self.rx.try_recv() {
                Ok(update) => {
                    self.apply(update, editor, observer, loader);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        applied
    }

    /// Waits up to `timeout` for the first update, then drains the rest.
    pub fn pump_timeout(
        &mut self,
        timeout: Duration,
        editor: &mut dyn LiveEditor,
        observer: &mut dyn LiveObserver,
        loader: &mut dyn AssetLoader,
    ) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => {
                self.apply(update, editor, observer, loader);
                1 + self.pump(editor, observer, loader)
            }
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                0
            }
        }
    }

    fn apply(
        &mut self,
        update: LiveUpdate,
        editor: &mut dyn LiveEditor,
        observer: &mut dyn LiveObserver,
        loader: &mut dyn AssetLoader,
    ) {
        match update {
            LiveUpdate::MapInfo(info) => {
                let map = editor.map_mut();
                map.set_name(format!("Live Map - {}", info.name));
                map.set_width(info.width);
                map.set_height(info.height);
                observer.on_refresh(RefreshCause::MapInfo);
            }
            LiveUpdate::Node { key, tiles } => {
                let changes = replace_node(editor, key, tiles);
                if changes > 0 {
                    observer.on_refresh(RefreshCause::RemoteChanges {
                        owner: None,
                        changes,
                    });
                }
            }
            LiveUpdate::Cursor(cursor) => observer.on_refresh(RefreshCause::Cursor(cursor)),
            LiveUpdate::Chat { speaker, message } => observer.on_log(LogLine::Chat {
                speaker,
                text: message,
            }),
            LiveUpdate::ClientList(clients) => observer.on_client_list(&clients),
            LiveUpdate::OperationStarted(name) => {
                let progress = OperationProgress::new(name);
                observer.on_status(&progress.status_text());
                self.operation = Some(progress);
            }
            LiveUpdate::OperationProgress(percent) => {
                let Some(progress) = self.operation.as_mut() else {
                    debug!(percent, "Progress without a started operation");
                    return;
                };
                progress.percent = percent;
                observer.on_status(&progress.status_text());
                if progress.is_finished() {
                    self.operation = None;
                }
            }
            LiveUpdate::ReloadAssets { version, reply } => {
                observer.on_log(LogLine::Message(format!(
                    "Server requires client version {version}, reloading assets..."
                )));
                let result = loader.load_version(version);
                if let Err(e) = &result {
                    warn!(version, error = %e, "Asset reload failed");
                    observer.on_log(LogLine::Message(e.to_string()));
                }
                if reply.send(result).is_err() {
                    debug!(version, "Engine stopped before reload finished");
                }
            }
            LiveUpdate::Log(text) => observer.on_log(LogLine::Message(text)),
            LiveUpdate::Disconnected { remote } => {
                observer.on_log(LogLine::Message(format!("Disconnected from {remote}.")));
            }
            LiveUpdate::Closed { reason } => {
                observer.on_log(LogLine::Message(reason));
                self.closed = true;
            }
        }
    }
}

/// Makes the node's floors match `tiles` through one remote action.
///
/// Local tiles the server did not send are cleared.
fn replace_node(editor: &mut dyn LiveEditor, key: NodeKey, tiles: Vec<TileRecord>) -> usize {
    let received: BTreeSet<Position> = tiles.iter().map(|t| t.position).collect();
    let mut batch: Vec<TileRecord> = editor
        .map()
        .leaf(key.grid_x(), key.grid_y())
        .map(|leaf| leaf.tiles_on(key.floors()))
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !received.contains(&t.position))
        .map(|t| TileRecord::empty(t.position))
        .collect();
    batch.extend(tiles);

    apply_remote_tiles(editor, None, batch).changes
}
