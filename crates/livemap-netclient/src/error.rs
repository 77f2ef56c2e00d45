//! Live client error types.

use livemap_editor::AssetLoadError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LiveClientError {
    #[error("previous connection not yet terminated")]
    AlreadyConnecting,

    #[error("failed to resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection lost: {0}")]
    ConnectionLost(String),

    #[error("protocol error: {0}")]
    Protocol(#[from] livemap_netproto::ProtoError),

    #[error("unexpected {packet} while {state}")]
    Violation { packet: String, state: String },

    #[error("kicked by server: {0}")]
    Kicked(String),

    #[error(transparent)]
    AssetReload(#[from] AssetLoadError),

    #[error("asset reload was abandoned")]
    ReloadAbandoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("channel send error")]
    ChannelSend,

    #[error("not connected to server")]
    NotConnected,
}
