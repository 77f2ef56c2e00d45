use livemap_netproto::frame::{FrameReader, ReadPolicy};
use livemap_netproto::types::{Color, LiveCursor, Position, TileRecord};
use livemap_netproto::{ClientPacket, NetworkMessage, NodeKey, ServerPacket, WirePacket};
use proptest::prelude::*;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq)]
enum Field {
    U8(u8),
    U16(u16),
    U32(u32),
    Str(String),
}

fn field() -> impl Strategy<Value = Field> {
    prop_oneof![
        any::<u8>().prop_map(Field::U8),
        any::<u16>().prop_map(Field::U16),
        any::<u32>().prop_map(Field::U32),
        ".{0,64}".prop_map(Field::Str),
    ]
}

fn read_field(msg: &mut NetworkMessage, like: &Field) -> Field {
    match like {
        Field::U8(_) => Field::U8(msg.read_u8().unwrap()),
        Field::U16(_) => Field::U16(msg.read_u16().unwrap()),
        Field::U32(_) => Field::U32(msg.read_u32().unwrap()),
        Field::Str(_) => Field::Str(msg.read_string().unwrap()),
    }
}

proptest! {
    #[test]
    fn field_sequences_survive_framing(fields in proptest::collection::vec(field(), 1..32)) {
        let mut out = NetworkMessage::new();
        for f in &fields {
            match f {
                Field::U8(v) => out.write_u8(*v),
                Field::U16(v) => out.write_u16(*v),
                Field::U32(v) => out.write_u32(*v),
                Field::Str(s) => out.write_str(s).unwrap(),
            }
        }
        let frame = out.finish().unwrap();

        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let payload = rt.block_on(async {
            let mut reader = FrameReader::new(&frame[..], ReadPolicy::default());
            reader.read_frame().await.unwrap().unwrap()
        });

        let mut msg = NetworkMessage::from_payload(&payload);
        for f in &fields {
            prop_assert_eq!(&read_field(&mut msg, f), f);
        }
        prop_assert!(msg.is_exhausted());
    }
}

#[tokio::test]
async fn packets_cross_a_stream_in_split_writes() {
    let (mut tx, rx) = tokio::io::duplex(16);

    let packets = vec![
        ClientPacket::Talk("hello there".into()),
        ClientPacket::NodeRequest(vec![NodeKey::for_tile(8, 12, false)]),
        ClientPacket::ChangeList(vec![TileRecord {
            position: Position::new(8, 12, 7),
            flags: 0,
            ground: 4526,
            items: vec![1, 2, 3, 4, 5, 6, 7, 8],
        }]),
        ClientPacket::CursorUpdate(LiveCursor {
            client_id: 77,
            color: Color::rgb(200, 10, 10),
            position: Position::new(8, 12, 7),
        }),
    ];

    let frames: Vec<_> = packets.iter().map(|p| p.to_frame().unwrap()).collect();
    let writer = tokio::spawn(async move {
        for frame in frames {
            // Small duplex buffer forces the reader to see partial frames.
            tx.write_all(&frame).await.unwrap();
        }
    });

    let mut reader = FrameReader::new(rx, ReadPolicy::default());
    let mut received = Vec::new();
    while let Some(payload) = reader.read_frame().await.unwrap() {
        received.extend(ClientPacket::decode_frame(&payload).unwrap());
    }
    writer.await.unwrap();

    assert_eq!(received, packets);
}

#[tokio::test]
async fn server_packets_decode_after_framing() {
    let (mut tx, rx) = tokio::io::duplex(1024);
    let packet = ServerPacket::ServerTalk {
        speaker: "mapper".into(),
        message: "going underground".into(),
    };
    tx.write_all(&packet.to_frame().unwrap()).await.unwrap();
    drop(tx);

    let mut reader = FrameReader::new(rx, ReadPolicy::default());
    let payload = reader.read_frame().await.unwrap().unwrap();
    assert_eq!(ServerPacket::decode_frame(&payload).unwrap(), vec![packet]);
    assert!(reader.read_frame().await.unwrap().is_none());
}
