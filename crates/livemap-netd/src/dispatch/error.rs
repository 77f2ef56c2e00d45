//! Handler error types. Every handler error closes the connection.

use thiserror::Error;

use crate::net::outbound::OutboundError;

#[derive(Debug, Error)]
pub enum HandlerError {
    /// Packet not valid for the peer's current state.
    #[error("protocol violation: {0}")]
    Violation(String),
    /// Wrong password. The peer is closed without a response.
    #[error("authentication failed")]
    BadPassword,
    /// The peer is told why and then closed.
    #[error("kicked: {0}")]
    Kick(String),
    #[error("send failed: {0}")]
    Send(#[from] OutboundError),
}

impl HandlerError {
    pub fn server_full() -> Self {
        Self::Kick("Server is full.".to_string())
    }

    /// Message to deliver before closing, if any.
    pub fn kick_reason(&self) -> Option<&str> {
        match self {
            Self::Kick(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Convenient Result type for handlers.
pub type HandlerResult = Result<(), HandlerError>;
