use std::time::Duration;

use livemap_netproto::constants::{DEFAULT_CLIENT_VERSION, DEFAULT_PORT};
use livemap_netproto::frame::ReadPolicy;

/// Configuration for one live session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host name or address literal of the server.
    pub host: String,
    pub port: u16,
    /// Name shown to other clients.
    pub name: String,
    pub password: String,
    /// Asset version announced in the first hello.
    pub client_version: u32,
    /// Per-candidate connect deadline. `None` waits for the OS.
    pub connect_timeout: Option<Duration>,
    pub read_policy: ReadPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            name: String::new(),
            password: String::new(),
            client_version: DEFAULT_CLIENT_VERSION,
            connect_timeout: Some(Duration::from_secs(5)),
            read_policy: ReadPolicy::default(),
        }
    }
}
