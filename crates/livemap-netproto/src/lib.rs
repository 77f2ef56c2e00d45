pub mod constants;
pub mod error;
pub mod frame;
pub mod message;
pub mod node_key;
pub mod packet;
pub mod packet_id;
pub mod types;

pub use error::ProtoError;
pub use message::NetworkMessage;
pub use node_key::NodeKey;
pub use packet::{ClientPacket, Hello, MapInfo, ServerPacket, WirePacket};
pub use packet_id::PacketId;
