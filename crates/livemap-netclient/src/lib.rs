//! Live map client library.
//!
//! # Architecture
//!
//! - [`transport`]: shared I/O service with a one-attempt-at-a-time guard
//! - [`tcp_client`]: resolve, connect with fallback, reader and writer tasks
//! - [`engine`]: connection lifecycle state machine
//! - [`session`]: updates posted to the UI thread and the pump applying them
//! - [`client`]: handle used by the UI to drive a session
//! - [`error`]: error types

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod pending;
pub mod session;
pub mod tcp_client;
pub mod transport;

// Re-export commonly used types
pub use client::{LiveClientHandle, connect};
pub use config::ClientConfig;
pub use engine::ClientState;
pub use error::LiveClientError;
pub use session::{LiveUpdate, OperationProgress, UpdatePump};
pub use transport::TransportService;
