/// Application version id sent in every client hello.
/// Identifies the editor build, not the wire format.
pub const APP_VERSION_ID: u32 = 30_400;

/// Wire-format protocol version.
/// Bump this only for breaking changes to framing or packet layouts.
pub const NET_VERSION: u32 = 6;

/// Frame length prefix in bytes.
///
/// Each frame on the stream is `[u32 payload_len_le][payload]`,
/// where `payload_len_le` counts payload bytes only.
pub const FRAME_LEN_PREFIX: usize = 4;

/// Largest payload a single frame may carry.
/// Headers announcing more than this are rejected before the payload is read.
pub const MAX_FRAME_PAYLOAD: usize = 1024 * 1024;

/// Strings carry a u16 length prefix.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Default TCP port for live sessions.
pub const DEFAULT_PORT: u16 = 31313;

/// Number of client ids handed out by a server by default (ids `1..=15`).
pub const DEFAULT_MAX_CLIENTS: u32 = 15;

/// Asset (client data) version assumed when none is configured.
pub const DEFAULT_CLIENT_VERSION: u32 = 1098;

/// Side length of a quad-tree leaf, in tiles.
pub const LEAF_SIZE: u16 = 4;

/// Shift converting a tile coordinate to a leaf grid coordinate.
pub const LEAF_SHIFT: u16 = 2;

/// Highest floor index.
pub const MAX_FLOOR: u8 = 15;

/// Floor index of ground level; floors above this index are underground.
pub const GROUND_FLOOR: u8 = 7;

/// Reserved cursor id a client stamps on outgoing cursor updates.
/// The server always overwrites it with the sender's assigned id.
pub const UNASSIGNED_CURSOR_ID: u32 = 77;
