//! Room datagrams

use bytes::{Buf, BufMut, BytesMut};
use lisa_core::{LisaError, LisaResult};

/// First byte of every datagram
pub const WIRE_MAGIC: u8 = b'L';

/// Current wire version
pub const WIRE_VERSION: u8 = 1;

/// Magic + version + kind
pub const PACKET_HEADER_SIZE: usize = 3;

/// Maximum datagram size (MTU-friendly)
pub const MAX_PACKET_SIZE: usize = 1400;

/// Packet kind byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    Join = 0x01,
    Welcome = 0x02,
    Reject = 0x03,
    Leave = 0x04,
    Data = 0x10,
    Ack = 0x11,
    Speakers = 0x20,
}

impl PacketKind {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(PacketKind::Join),
            0x02 => Some(PacketKind::Welcome),
            0x03 => Some(PacketKind::Reject),
            0x04 => Some(PacketKind::Leave),
            0x10 => Some(PacketKind::Data),
            0x11 => Some(PacketKind::Ack),
            0x20 => Some(PacketKind::Speakers),
            _ => None,
        }
    }
}

/// One room datagram
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    /// Client asks to enter a room
    Join {
        room: String,
        participant: String,
        token: String,
    },
    /// Agent accepted the join
    Welcome { agent: String },
    /// Agent refused the join
    Reject { reason: String },
    /// Either side is leaving
    Leave,
    /// Topic-tagged data message; the receiver answers with `Ack { seq }`
    Data {
        seq: u32,
        topic: String,
        payload: Vec<u8>,
    },
    /// Receipt for a `Data` packet
    Ack { seq: u32 },
    /// Active speaker set changed
    Speakers { identities: Vec<String> },
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Join { .. } => PacketKind::Join,
            Packet::Welcome { .. } => PacketKind::Welcome,
            Packet::Reject { .. } => PacketKind::Reject,
            Packet::Leave => PacketKind::Leave,
            Packet::Data { .. } => PacketKind::Data,
            Packet::Ack { .. } => PacketKind::Ack,
            Packet::Speakers { .. } => PacketKind::Speakers,
        }
    }

    /// Serialize to a datagram
    pub fn encode(&self) -> LisaResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u8(WIRE_MAGIC);
        buf.put_u8(WIRE_VERSION);
        buf.put_u8(self.kind() as u8);

        match self {
            Packet::Join {
                room,
                participant,
                token,
            } => {
                put_bytes(&mut buf, room.as_bytes())?;
                put_bytes(&mut buf, participant.as_bytes())?;
                put_bytes(&mut buf, token.as_bytes())?;
            }
            Packet::Welcome { agent } => put_bytes(&mut buf, agent.as_bytes())?,
            Packet::Reject { reason } => put_bytes(&mut buf, reason.as_bytes())?,
            Packet::Leave => {}
            Packet::Data {
                seq,
                topic,
                payload,
            } => {
                buf.put_u32_le(*seq);
                put_bytes(&mut buf, topic.as_bytes())?;
                put_bytes(&mut buf, payload)?;
            }
            Packet::Ack { seq } => buf.put_u32_le(*seq),
            Packet::Speakers { identities } => {
                let count = u8::try_from(identities.len()).map_err(|_| {
                    LisaError::InvalidWireFormat(format!(
                        "Too many speakers: {}",
                        identities.len()
                    ))
                })?;
                buf.put_u8(count);
                for identity in identities {
                    put_bytes(&mut buf, identity.as_bytes())?;
                }
            }
        }

        if buf.len() > MAX_PACKET_SIZE {
            return Err(LisaError::InvalidWireFormat(format!(
                "Packet too large: {} > {}",
                buf.len(),
                MAX_PACKET_SIZE
            )));
        }

        Ok(buf.to_vec())
    }

    /// Parse a datagram
    pub fn decode(datagram: &[u8]) -> LisaResult<Self> {
        if datagram.len() < PACKET_HEADER_SIZE {
            return Err(LisaError::BufferTooShort {
                expected: PACKET_HEADER_SIZE,
                actual: datagram.len(),
            });
        }

        let mut buf = datagram;
        let magic = buf.get_u8();
        if magic != WIRE_MAGIC {
            return Err(LisaError::InvalidWireFormat(format!(
                "Bad magic: {:#04x}",
                magic
            )));
        }

        let version = buf.get_u8();
        if version != WIRE_VERSION {
            return Err(LisaError::InvalidWireFormat(format!(
                "Unsupported version: {}",
                version
            )));
        }

        let kind_byte = buf.get_u8();
        let kind = PacketKind::from_byte(kind_byte).ok_or_else(|| {
            LisaError::InvalidWireFormat(format!("Unknown packet kind: {:#04x}", kind_byte))
        })?;

        let packet = match kind {
            PacketKind::Join => Packet::Join {
                room: get_string(&mut buf)?,
                participant: get_string(&mut buf)?,
                token: get_string(&mut buf)?,
            },
            PacketKind::Welcome => Packet::Welcome {
                agent: get_string(&mut buf)?,
            },
            PacketKind::Reject => Packet::Reject {
                reason: get_string(&mut buf)?,
            },
            PacketKind::Leave => Packet::Leave,
            PacketKind::Data => Packet::Data {
                seq: get_u32(&mut buf)?,
                topic: get_string(&mut buf)?,
                payload: get_bytes(&mut buf)?,
            },
            PacketKind::Ack => Packet::Ack {
                seq: get_u32(&mut buf)?,
            },
            PacketKind::Speakers => {
                ensure_remaining(buf, 1)?;
                let count = buf.get_u8() as usize;
                let mut identities = Vec::with_capacity(count);
                for _ in 0..count {
                    identities.push(get_string(&mut buf)?);
                }
                Packet::Speakers { identities }
            }
        };

        Ok(packet)
    }
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) -> LisaResult<()> {
    let len = u16::try_from(bytes.len()).map_err(|_| {
        LisaError::InvalidWireFormat(format!("Field too long: {} bytes", bytes.len()))
    })?;
    buf.put_u16_le(len);
    buf.put_slice(bytes);
    Ok(())
}

fn ensure_remaining(buf: &[u8], needed: usize) -> LisaResult<()> {
    if buf.remaining() < needed {
        return Err(LisaError::BufferTooShort {
            expected: needed,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

fn get_u32(buf: &mut &[u8]) -> LisaResult<u32> {
    ensure_remaining(buf, 4)?;
    Ok(buf.get_u32_le())
}

fn get_bytes(buf: &mut &[u8]) -> LisaResult<Vec<u8>> {
    ensure_remaining(buf, 2)?;
    let len = buf.get_u16_le() as usize;
    ensure_remaining(buf, len)?;
    let bytes = buf[..len].to_vec();
    buf.advance(len);
    Ok(bytes)
}

fn get_string(buf: &mut &[u8]) -> LisaResult<String> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes)
        .map_err(|_| LisaError::InvalidWireFormat("String field is not UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_data_layout() {
        let packet = Packet::Data {
            seq: 258,
            topic: "gesture".into(),
            payload: b"Thumb_Up".to_vec(),
        };
        let bytes = packet.encode().unwrap();

        assert_eq!(&bytes[..3], &[b'L', WIRE_VERSION, 0x10]);
        assert_eq!(&bytes[3..7], &258u32.to_le_bytes());
        assert_eq!(&bytes[7..9], &7u16.to_le_bytes());
        assert_eq!(&bytes[9..16], b"gesture");
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_ack_layout() {
        let bytes = Packet::Ack { seq: 7 }.encode().unwrap();
        assert_eq!(bytes, vec![b'L', WIRE_VERSION, 0x11, 7, 0, 0, 0]);
        assert_eq!(Packet::decode(&bytes).unwrap(), Packet::Ack { seq: 7 });
        assert!(matches!(
            Packet::decode(&bytes[..5]),
            Err(LisaError::BufferTooShort { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn test_join_decodes() {
        let packet = Packet::Join {
            room: "lisa-room".into(),
            participant: "user".into(),
            token: "jwt".into(),
        };
        assert_eq!(Packet::decode(&packet.encode().unwrap()).unwrap(), packet);
    }

    #[test]
    fn test_empty_speaker_set() {
        let packet = Packet::Speakers { identities: vec![] };
        let bytes = packet.encode().unwrap();
        assert_eq!(bytes.len(), PACKET_HEADER_SIZE + 1);
        assert_eq!(Packet::decode(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_oversize_rejected() {
        let packet = Packet::Data {
            seq: 0,
            topic: "chat_message".into(),
            payload: vec![b'a'; MAX_PACKET_SIZE],
        };
        assert!(matches!(
            packet.encode(),
            Err(LisaError::InvalidWireFormat(_))
        ));
    }

    #[test]
    fn test_bad_header() {
        assert!(matches!(
            Packet::decode(&[b'L']),
            Err(LisaError::BufferTooShort { expected: 3, actual: 1 })
        ));
        assert!(Packet::decode(&[b'X', WIRE_VERSION, 0x04]).is_err());
        assert!(Packet::decode(&[b'L', 9, 0x04]).is_err());
        assert!(Packet::decode(&[b'L', WIRE_VERSION, 0x7F]).is_err());
    }

    #[test]
    fn test_truncated_body() {
        let bytes = Packet::Welcome {
            agent: "ada".into(),
        }
        .encode()
        .unwrap();
        assert!(Packet::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    proptest! {
        #[test]
        fn prop_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = Packet::decode(&data);
        }
    }
}
