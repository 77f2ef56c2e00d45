//! Value types carried inside packets.

use crate::constants::{GROUND_FLOOR, MAX_FLOOR};
use crate::error::ProtoError;
use crate::message::NetworkMessage;

/// Server-assigned client identifier. `0` means unassigned.
pub type ClientId = u32;

/// Tile position: x, y in tiles, z is the floor (0..=15, 7 is ground level).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub const fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    pub fn is_underground(&self) -> bool {
        self.z > GROUND_FLOOR
    }

    pub fn encode(&self, msg: &mut NetworkMessage) {
        msg.write_u16(self.x);
        msg.write_u16(self.y);
        msg.write_u8(self.z);
    }

    pub fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(Self {
            x: msg.read_u16()?,
            y: msg.read_u16()?,
            z: msg.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn encode(&self, msg: &mut NetworkMessage) {
        msg.write_u8(self.r);
        msg.write_u8(self.g);
        msg.write_u8(self.b);
        msg.write_u8(self.a);
    }

    pub fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(Self {
            r: msg.read_u8()?,
            g: msg.read_u8()?,
            b: msg.read_u8()?,
            a: msg.read_u8()?,
        })
    }
}

/// Floors a node packet covers, selected by the key's underground flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloorSpan {
    /// Floors `0..=7`.
    Aboveground,
    /// Floors `8..=15`.
    Underground,
}

impl FloorSpan {
    pub fn from_underground(underground: bool) -> Self {
        if underground {
            Self::Underground
        } else {
            Self::Aboveground
        }
    }

    pub fn contains(&self, z: u8) -> bool {
        match self {
            Self::Aboveground => z <= GROUND_FLOOR,
            Self::Underground => z > GROUND_FLOOR && z <= MAX_FLOOR,
        }
    }

    /// Bit mask over floors, bit `n` set for floor `n`.
    pub fn mask(&self) -> u16 {
        match self {
            Self::Aboveground => 0x00FF,
            Self::Underground => 0xFF00,
        }
    }
}

/// Serialized contents of one tile.
///
/// A record with no ground and no items describes an empty tile.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TileRecord {
    pub position: Position,
    pub flags: u32,
    pub ground: u16,
    pub items: Vec<u16>,
}

impl TileRecord {
    pub fn empty(position: Position) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ground == 0 && self.items.is_empty()
    }

    pub fn encode(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError> {
        if self.items.len() > u16::MAX as usize {
            return Err(ProtoError::TooManyItems(self.items.len()));
        }
        self.position.encode(msg);
        msg.write_u32(self.flags);
        msg.write_u16(self.ground);
        msg.write_u16(self.items.len() as u16);
        for item in &self.items {
            msg.write_u16(*item);
        }
        Ok(())
    }

    pub fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        let position = Position::decode(msg)?;
        let flags = msg.read_u32()?;
        let ground = msg.read_u16()?;
        let count = msg.read_u16()? as usize;
        // Each item is two bytes; refuse counts the payload cannot hold.
        if count * 2 > msg.remaining() {
            return Err(ProtoError::TooShort {
                needed: count * 2,
                remaining: msg.remaining(),
            });
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(msg.read_u16()?);
        }
        Ok(Self {
            position,
            flags,
            ground,
            items,
        })
    }
}

pub(crate) fn encode_tiles(msg: &mut NetworkMessage, tiles: &[TileRecord]) -> Result<(), ProtoError> {
    msg.write_u32(tiles.len() as u32);
    for tile in tiles {
        tile.encode(msg)?;
    }
    Ok(())
}

pub(crate) fn decode_tiles(msg: &mut NetworkMessage) -> Result<Vec<TileRecord>, ProtoError> {
    let count = msg.read_u32()? as usize;
    // Smallest record is 13 bytes; cap the allocation by what the payload can hold.
    let mut tiles = Vec::with_capacity(count.min(msg.remaining() / 13));
    for _ in 0..count {
        tiles.push(TileRecord::decode(msg)?);
    }
    Ok(tiles)
}

/// A remote user's pointer on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveCursor {
    pub client_id: ClientId,
    pub color: Color,
    pub position: Position,
}

impl LiveCursor {
    pub fn encode(&self, msg: &mut NetworkMessage) {
        msg.write_u32(self.client_id);
        self.color.encode(msg);
        self.position.encode(msg);
    }

    pub fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(Self {
            client_id: msg.read_u32()?,
            color: Color::decode(msg)?,
            position: Position::decode(msg)?,
        })
    }
}

/// One row of the connected-clients list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    pub client_id: ClientId,
    pub name: String,
    pub color: Color,
}

impl ClientEntry {
    pub fn encode(&self, msg: &mut NetworkMessage) -> Result<(), ProtoError> {
        msg.write_u32(self.client_id);
        msg.write_str(&self.name)?;
        self.color.encode(msg);
        Ok(())
    }

    pub fn decode(msg: &mut NetworkMessage) -> Result<Self, ProtoError> {
        Ok(Self {
            client_id: msg.read_u32()?,
            name: msg.read_string()?,
            color: Color::decode(msg)?,
        })
    }
}
