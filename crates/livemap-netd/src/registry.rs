//! Registered clients of a live session.
//!
//! Entries are keyed by client id; peers hold only their id. Ids are drawn
//! from a bounded pool `1..=max_clients`, lowest free id first.

use std::collections::{BTreeMap, HashSet};

use livemap_netproto::NodeKey;
use livemap_netproto::types::{ClientEntry, ClientId, Color};

use crate::net::inbound::ConnId;
use crate::net::outbound::{OutboundTx, Recipient};

/// Cursor colors handed out by client id.
pub const PALETTE: [Color; 16] = [
    Color::rgb(0xE6, 0x19, 0x4B),
    Color::rgb(0x3C, 0xB4, 0x4B),
    Color::rgb(0xFF, 0xE1, 0x19),
    Color::rgb(0x43, 0x63, 0xD8),
    Color::rgb(0xF5, 0x82, 0x31),
    Color::rgb(0x91, 0x1E, 0xB4),
    Color::rgb(0x46, 0xF0, 0xF0),
    Color::rgb(0xF0, 0x32, 0xE6),
    Color::rgb(0xBC, 0xF6, 0x0C),
    Color::rgb(0xFA, 0xBE, 0xBE),
    Color::rgb(0x00, 0x80, 0x80),
    Color::rgb(0xE6, 0xBE, 0xFF),
    Color::rgb(0x9A, 0x63, 0x24),
    Color::rgb(0xFF, 0xFA, 0xC8),
    Color::rgb(0x80, 0x00, 0x00),
    Color::rgb(0xAA, 0xFF, 0xC3),
];

pub fn palette_color(client_id: ClientId) -> Color {
    PALETTE[(client_id.saturating_sub(1) as usize) % PALETTE.len()]
}

#[derive(Debug)]
pub struct RegisteredClient {
    pub client_id: ClientId,
    pub conn_id: ConnId,
    pub name: String,
    pub color: Color,
    pub outbound: OutboundTx,
    /// Nodes this client has requested; node updates are only pushed for these.
    pub known_nodes: HashSet<NodeKey>,
}

impl RegisteredClient {
    pub fn recipient(&self) -> Recipient {
        Recipient {
            conn_id: self.conn_id,
            tx: self.outbound.clone(),
        }
    }
}

#[derive(Debug)]
pub struct SessionRegistry {
    max_clients: u32,
    clients: BTreeMap<ClientId, RegisteredClient>,
}

impl SessionRegistry {
    pub fn new(max_clients: u32) -> Self {
        Self {
            max_clients,
            clients: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn free_client_id(&self) -> Option<ClientId> {
        (1..=self.max_clients).find(|id| !self.clients.contains_key(id))
    }

    /// Assigns the lowest free id. Returns `None` when the pool is exhausted.
    pub fn register(
        &mut self,
        conn_id: ConnId,
        name: &str,
        outbound: OutboundTx,
    ) -> Option<ClientId> {
        let client_id = self.free_client_id()?;
        self.clients.insert(
            client_id,
            RegisteredClient {
                client_id,
                conn_id,
                name: name.to_string(),
                color: palette_color(client_id),
                outbound,
                known_nodes: HashSet::new(),
            },
        );
        Some(client_id)
    }

    pub fn unregister(&mut self, client_id: ClientId) -> Option<RegisteredClient> {
        self.clients.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&RegisteredClient> {
        self.clients.get(&client_id)
    }

    /// Returns `true` if the stored color changed.
    pub fn set_color(&mut self, client_id: ClientId, color: Color) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.color != color => {
                client.color = color;
                true
            }
            _ => false,
        }
    }

    pub fn remember_node(&mut self, client_id: ClientId, key: NodeKey) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.known_nodes.insert(key);
        }
    }

    pub fn entries(&self) -> Vec<ClientEntry> {
        self.clients
            .values()
            .map(|c| ClientEntry {
                client_id: c.client_id,
                name: c.name.clone(),
                color: c.color,
            })
            .collect()
    }

    pub fn recipients_except(&self, except: Option<ClientId>) -> Vec<Recipient> {
        self.clients
            .values()
            .filter(|c| Some(c.client_id) != except)
            .map(RegisteredClient::recipient)
            .collect()
    }

    pub fn recipients_knowing(&self, key: NodeKey, except: Option<ClientId>) -> Vec<Recipient> {
        self.clients
            .values()
            .filter(|c| Some(c.client_id) != except && c.known_nodes.contains(&key))
            .map(RegisteredClient::recipient)
            .collect()
    }
}
