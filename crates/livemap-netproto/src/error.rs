use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("buffer too short: needed {needed} bytes, {remaining} remaining")]
    TooShort { needed: usize, remaining: usize },
    #[error("empty frame")]
    EmptyFrame,
    #[error("frame too large: {0}")]
    FrameTooLarge(usize),
    #[error("too many items in one field: {0}")]
    TooManyItems(usize),
    #[error("string too long: {0}")]
    StringTooLong(usize),
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,
    #[error("unknown packet type: {0:#04x}")]
    UnknownPacketType(u8),
    #[error("unexpected packet for this direction: {0:?}")]
    WrongDirection(crate::packet_id::PacketId),
    #[error("node coordinate out of range: grid ({grid_x}, {grid_y})")]
    NodeOutOfRange { grid_x: u32, grid_y: u32 },
    #[error("incomplete read: expected {expected} bytes, received {received}")]
    IncompleteRead { expected: usize, received: usize },
    #[error("read retry limit reached after {0} attempts")]
    RetryLimit(u32),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
