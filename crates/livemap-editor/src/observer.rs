use livemap_netproto::types::{ClientEntry, ClientId, LiveCursor};
use tracing::info;

/// Why the view should be redrawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshCause {
    /// A remote action was committed.
    RemoteChanges {
        owner: Option<ClientId>,
        changes: usize,
    },
    /// A remote cursor moved.
    Cursor(LiveCursor),
    /// Map name or dimensions changed.
    MapInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Message(String),
    Chat { speaker: String, text: String },
}

/// Notification hooks for the view layer. Every hook defaults to a no-op.
pub trait LiveObserver: Send {
    fn on_refresh(&mut self, _cause: RefreshCause) {}

    fn on_log(&mut self, _line: LogLine) {}

    /// Status bar text, e.g. server operation progress.
    fn on_status(&mut self, _text: &str) {}

    fn on_client_list(&mut self, _clients: &[ClientEntry]) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl LiveObserver for NullObserver {}

/// Observer for headless hosts: forwards log, status and client list lines to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LiveObserver for TracingObserver {
    fn on_log(&mut self, line: LogLine) {
        match line {
            LogLine::Message(text) => info!("{text}"),
            LogLine::Chat { speaker, text } => info!(%speaker, "chat: {text}"),
        }
    }

    fn on_status(&mut self, text: &str) {
        info!(status = text);
    }

    fn on_client_list(&mut self, clients: &[ClientEntry]) {
        let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
        info!(count = clients.len(), ?names, "client list updated");
    }
}
