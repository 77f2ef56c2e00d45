//! Packet sum types, one per direction.
//!
//! A packet is a one-byte [`PacketId`] followed by its body. A frame payload
//! may carry several packets back to back; [`WirePacket::decode_frame`]
//! yields them in order and fails on the first malformed one.

use bytes::Bytes;

use crate::error::ProtoError;
use crate::message::NetworkMessage;
use crate::node_key::NodeKey;
use crate::packet_id::PacketId;
use crate::types::{decode_tiles, encode_tiles, ClientEntry, LiveCursor, TileRecord};

/// Shared encode/decode plumbing for both packet directions.
pub trait WirePacket: Sized {
    fn id(&self) -> PacketId;

    fn encode_body(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError>;

    fn decode_body(id: PacketId, msg: &mut NetworkMessage) -> Result<Self, ProtoError>;

    /// Direction check applied to a decoded tag.
    fn accepts(id: PacketId) -> bool;

    fn encode(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError> {
        msg.write_u8(self.id().as_u8());
        self.encode_body(msg)
    }

    /// Encodes a single packet as a complete frame.
    fn to_frame(&self) -> Result<Bytes, ProtoError> {
        let mut msg = NetworkMessage::new();
        self.encode(&mut msg)?;
        msg.finish()
    }

    fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        let tag = msg.read_u8()?;
        let id = PacketId::from_u8(tag).ok_or(ProtoError::UnknownPacketType(tag))?;
        if !Self::accepts(id) {
            return Err(ProtoError::WrongDirection(id));
        }
        Self::decode_body(id, msg)
    }

    /// Decodes every packet in a frame payload.
    fn decode_frame(payload: &[u8]) -> Result<Vec<Self>, ProtoError> {
        let mut msg = NetworkMessage::from_payload(payload);
        let mut packets = Vec::new();
        while !msg.is_exhausted() {
            packets.push(Self::decode(&mut msg)?);
        }
        Ok(packets)
    }
}

/// Login payload sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub app_version: u32,
    pub net_version: u32,
    pub client_version: u32,
    pub name: String,
    pub password: String,
}

/// Map metadata announced once a client is admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    pub name: String,
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPacket {
    Hello(Hello),
    Ready,
    NodeRequest(Vec<NodeKey>),
    ChangeList(Vec<TileRecord>),
    AddHouse,
    EditHouse,
    RemoveHouse,
    Talk(String),
    CursorUpdate(LiveCursor),
}

impl WirePacket for ClientPacket {
    fn id(&self) -> PacketId {
        match self {
            Self::Hello(_) => PacketId::HelloFromClient,
            Self::Ready => PacketId::ReadyClient,
            Self::NodeRequest(_) => PacketId::NodeRequest,
            Self::ChangeList(_) => PacketId::ChangeList,
            Self::AddHouse => PacketId::AddHouse,
            Self::EditHouse => PacketId::EditHouse,
            Self::RemoveHouse => PacketId::RemoveHouse,
            Self::Talk(_) => PacketId::ClientTalk,
            Self::CursorUpdate(_) => PacketId::ClientCursorUpdate,
        }
    }

    fn accepts(id: PacketId) -> bool {
        id.is_from_client()
    }

    fn encode_body(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError> {
        match self {
            Self::Hello(hello) => {
                msg.write_u32(hello.app_version);
                msg.write_u32(hello.net_version);
                msg.write_u32(hello.client_version);
                msg.write_str(&hello.name)?;
                msg.write_str(&hello.password)?;
            }
            Self::Ready | Self::AddHouse | Self::EditHouse | Self::RemoveHouse => {}
            Self::NodeRequest(keys) => {
                msg.write_u32(keys.len() as u32);
                for key in keys {
                    msg.write_u32(key.raw());
                }
            }
            Self::ChangeList(tiles) => encode_tiles(msg, tiles)?,
            Self::Talk(text) => msg.write_str(text)?,
            Self::CursorUpdate(cursor) => cursor.encode(msg),
        }
        Ok(())
    }

    fn decode_body(id: PacketId, msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(match id {
            PacketId::HelloFromClient => Self::Hello(Hello {
                app_version: msg.read_u32()?,
                net_version: msg.read_u32()?,
                client_version: msg.read_u32()?,
                name: msg.read_string()?,
                password: msg.read_string()?,
            }),
            PacketId::ReadyClient => Self::Ready,
            PacketId::NodeRequest => {
                let count = msg.read_u32()? as usize;
                if count.saturating_mul(4) > msg.remaining() {
                    return Err(ProtoError::TooShort {
                        needed: count.saturating_mul(4),
                        remaining: msg.remaining(),
                    });
                }
                let mut keys = Vec::with_capacity(count);
                for _ in 0..count {
                    keys.push(NodeKey::from_raw(msg.read_u32()?));
                }
                Self::NodeRequest(keys)
            }
            PacketId::ChangeList => Self::ChangeList(decode_tiles(msg)?),
            PacketId::AddHouse => Self::AddHouse,
            PacketId::EditHouse => Self::EditHouse,
            PacketId::RemoveHouse => Self::RemoveHouse,
            PacketId::ClientTalk => Self::Talk(msg.read_string()?),
            PacketId::ClientCursorUpdate => Self::CursorUpdate(LiveCursor::decode(msg)?),
            other => return Err(ProtoError::WrongDirection(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPacket {
    HelloFromServer(MapInfo),
    Kick(String),
    Accepted,
    VersionMismatch(u32),
    ServerTalk { speaker: String, message: String },
    ClientList(Vec<ClientEntry>),
    Node { key: NodeKey, tiles: Vec<TileRecord> },
    CursorUpdate(LiveCursor),
    StartOperation(String),
    UpdateOperation(u32),
}

impl WirePacket for ServerPacket {
    fn id(&self) -> PacketId {
        match self {
            Self::HelloFromServer(_) => PacketId::HelloFromServer,
            Self::Kick(_) => PacketId::Kick,
            Self::Accepted => PacketId::Accepted,
            Self::VersionMismatch(_) => PacketId::VersionMismatch,
            Self::ServerTalk { .. } => PacketId::ServerTalk,
            Self::ClientList(_) => PacketId::ClientList,
            Self::Node { .. } => PacketId::Node,
            Self::CursorUpdate(_) => PacketId::CursorUpdate,
            Self::StartOperation(_) => PacketId::StartOperation,
            Self::UpdateOperation(_) => PacketId::UpdateOperation,
        }
    }

    fn accepts(id: PacketId) -> bool {
        !id.is_from_client()
    }

    fn encode_body(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError> {
        match self {
            Self::HelloFromServer(info) => {
                msg.write_str(&info.name)?;
                msg.write_u16(info.width);
                msg.write_u16(info.height);
            }
            Self::Kick(reason) => msg.write_str(reason)?,
            Self::Accepted => {}
            Self::VersionMismatch(version) => msg.write_u32(*version),
            Self::ServerTalk { speaker, message } => {
                msg.write_str(speaker)?;
                msg.write_str(message)?;
            }
            Self::ClientList(entries) => {
                msg.write_u32(entries.len() as u32);
                for entry in entries {
                    entry.encode(msg)?;
                }
            }
            Self::Node { key, tiles } => {
                msg.write_u32(key.raw());
                encode_tiles(msg, tiles)?;
            }
            Self::CursorUpdate(cursor) => cursor.encode(msg),
            Self::StartOperation(name) => msg.write_str(name)?,
            Self::UpdateOperation(percent) => msg.write_u32(*percent),
        }
        Ok(())
    }

    fn decode_body(id: PacketId, msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(match id {
            PacketId::HelloFromServer => Self::HelloFromServer(MapInfo {
                name: msg.read_string()?,
                width: msg.read_u16()?,
                height: msg.read_u16()?,
            }),
            PacketId::Kick => Self::Kick(msg.read_string()?),
            PacketId::Accepted => Self::Accepted,
            PacketId::VersionMismatch => Self::VersionMismatch(msg.read_u32()?),
            PacketId::ServerTalk => Self::ServerTalk {
                speaker: msg.read_string()?,
                message: msg.read_string()?,
            },
            PacketId::ClientList => {
                let count = msg.read_u32()? as usize;
                let mut entries = Vec::with_capacity(count.min(msg.remaining() / 10));
                for _ in 0..count {
                    entries.push(ClientEntry::decode(msg)?);
                }
                Self::ClientList(entries)
            }
            PacketId::Node => Self::Node {
                key: NodeKey::from_raw(msg.read_u32()?),
                tiles: decode_tiles(msg)?,
            },
            PacketId::CursorUpdate => Self::CursorUpdate(LiveCursor::decode(msg)?),
            PacketId::StartOperation => Self::StartOperation(msg.read_string()?),
            PacketId::UpdateOperation => Self::UpdateOperation(msg.read_u32()?),
            other => return Err(ProtoError::WrongDirection(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FRAME_LEN_PREFIX;
    use crate::types::{Color, Position};

    fn payload_of(frame: &Bytes) -> &[u8] {
        &frame[FRAME_LEN_PREFIX..]
    }

    #[test]
    fn hello_layout_on_the_wire() {
        let frame = ClientPacket::Hello(Hello {
            app_version: 1,
            net_version: 2,
            client_version: 3,
            name: "ab".into(),
            password: "".into(),
        })
        .to_frame()
        .unwrap();

        let expected: Vec<u8> = [
            &[0x10][..],
            &1u32.to_le_bytes(),
            &2u32.to_le_bytes(),
            &3u32.to_le_bytes(),
            &[2, 0, b'a', b'b'],
            &[0, 0],
        ]
        .concat();
        assert_eq!(payload_of(&frame), &expected[..]);
    }

    #[test]
    fn node_request_carries_count_and_keys() {
        let keys = vec![
            NodeKey::new(2, 3, false).unwrap(),
            NodeKey::new(2, 3, true).unwrap(),
        ];
        let frame = ClientPacket::NodeRequest(keys.clone()).to_frame().unwrap();
        let decoded = ClientPacket::decode_frame(payload_of(&frame)).unwrap();
        assert_eq!(decoded, vec![ClientPacket::NodeRequest(keys)]);
    }

    #[test]
    fn several_packets_in_one_frame_decode_in_order() {
        let mut msg = NetworkMessage::new();
        ClientPacket::Talk("hi".into()).encode(&mut msg).unwrap();
        ClientPacket::CursorUpdate(LiveCursor {
            client_id: 77,
            color: Color::rgb(1, 2, 3),
            position: Position::new(10, 11, 7),
        })
        .encode(&mut msg)
        .unwrap();
        ClientPacket::Ready.encode(&mut msg).unwrap();
        let frame = msg.finish().unwrap();

        let packets = ClientPacket::decode_frame(payload_of(&frame)).unwrap();
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0], ClientPacket::Talk("hi".into()));
        assert!(matches!(packets[1], ClientPacket::CursorUpdate(c) if c.client_id == 77));
        assert_eq!(packets[2], ClientPacket::Ready);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert!(matches!(
            ClientPacket::decode_frame(&[0x7F]),
            Err(ProtoError::UnknownPacketType(0x7F))
        ));
    }

    #[test]
    fn server_tags_are_refused_by_client_decoder() {
        let frame = ServerPacket::Accepted.to_frame().unwrap();
        assert!(matches!(
            ClientPacket::decode_frame(payload_of(&frame)),
            Err(ProtoError::WrongDirection(PacketId::Accepted))
        ));
        let frame = ClientPacket::Ready.to_frame().unwrap();
        assert!(matches!(
            ServerPacket::decode_frame(payload_of(&frame)),
            Err(ProtoError::WrongDirection(PacketId::ReadyClient))
        ));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let frame = ServerPacket::VersionMismatch(30_500).to_frame().unwrap();
        let payload = payload_of(&frame);
        assert!(matches!(
            ServerPacket::decode_frame(&payload[..payload.len() - 1]),
            Err(ProtoError::TooShort { .. })
        ));
    }

    #[test]
    fn node_request_count_larger_than_payload_is_rejected() {
        let mut msg = NetworkMessage::new();
        msg.write_u8(PacketId::NodeRequest.as_u8());
        msg.write_u32(u32::MAX);
        let frame = msg.finish().unwrap();
        assert!(matches!(
            ClientPacket::decode_frame(payload_of(&frame)),
            Err(ProtoError::TooShort { .. })
        ));
    }

    #[test]
    fn node_packet_decodes_with_tiles() {
        let key = NodeKey::new(5, 6, true).unwrap();
        let tiles = vec![TileRecord {
            position: Position::new(20, 24, 9),
            flags: 0,
            ground: 351,
            items: vec![1987, 2000],
        }];
        let frame = ServerPacket::Node {
            key,
            tiles: tiles.clone(),
        }
        .to_frame()
        .unwrap();
        let decoded = ServerPacket::decode_frame(payload_of(&frame)).unwrap();
        assert_eq!(decoded, vec![ServerPacket::Node { key, tiles }]);
    }
}
