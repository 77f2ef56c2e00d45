use strum::FromRepr;

/// One-byte packet tag. Client-to-server tags live below `0x80`,
/// server-to-client tags at `0x80` and above.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum PacketId {
    HelloFromClient = 0x10,
    ReadyClient = 0x11,

    NodeRequest = 0x20,
    ChangeList = 0x21,
    AddHouse = 0x23,
    EditHouse = 0x24,
    RemoveHouse = 0x25,

    ClientTalk = 0x30,
    ClientCursorUpdate = 0x31,

    HelloFromServer = 0x80,
    Kick = 0x81,
    Accepted = 0x82,
    VersionMismatch = 0x83,
    ServerTalk = 0x84,
    ClientList = 0x85,

    Node = 0x90,
    CursorUpdate = 0x91,
    StartOperation = 0x92,
    UpdateOperation = 0x93,
}

impl PacketId {
    pub fn from_u8(tag: u8) -> Option<Self> {
        Self::from_repr(tag)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_from_client(self) -> bool {
        self.as_u8() < 0x80
    }
}
