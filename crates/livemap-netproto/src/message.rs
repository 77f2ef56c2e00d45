//! Typed sequential access to a packet payload.
//!
//! A message built for sending reserves the frame length prefix at the front
//! of its buffer; [`NetworkMessage::finish`] fills it in once the payload is
//! complete. A message built from a received payload has no prefix and is
//! read front to back through an internal cursor.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::{FRAME_LEN_PREFIX, MAX_FRAME_PAYLOAD, MAX_STRING_LEN};
use crate::error::ProtoError;

#[derive(Debug, Clone)]
pub struct NetworkMessage {
    buf: BytesMut,
    pos: usize,
    prefixed: bool,
}

impl Default for NetworkMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMessage {
    /// Empty outgoing message with the frame prefix reserved.
    pub fn new() -> Self {
        let mut buf = BytesMut::with_capacity(256);
        buf.put_bytes(0, FRAME_LEN_PREFIX);
        Self {
            buf,
            pos: FRAME_LEN_PREFIX,
            prefixed: true,
        }
    }

    /// Incoming message over a received frame payload.
    pub fn from_payload(payload: &[u8]) -> Self {
        Self {
            buf: BytesMut::from(payload),
            pos: 0,
            prefixed: false,
        }
    }

    /// Bytes written after the frame prefix.
    pub fn payload_len(&self) -> usize {
        if self.prefixed {
            self.buf.len() - FRAME_LEN_PREFIX
        } else {
            self.buf.len()
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    /// Writes a u16 length prefix followed by the raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtoError> {
        if bytes.len() > MAX_STRING_LEN {
            return Err(ProtoError::StringTooLong(bytes.len()));
        }
        self.buf.put_u16_le(bytes.len() as u16);
        self.buf.put_slice(bytes);
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), ProtoError> {
        self.write_bytes(s.as_bytes())
    }

    fn take(&mut self, n: usize) -> Result<&[u8], ProtoError> {
        let remaining = self.remaining();
        if remaining < n {
            return Err(ProtoError::TooShort {
                needed: n,
                remaining,
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtoError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtoError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtoError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ProtoError> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_string(&mut self) -> Result<String, ProtoError> {
        String::from_utf8(self.read_bytes()?).map_err(|_| ProtoError::InvalidUtf8)
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Writes the payload length into the reserved prefix and returns the
    /// complete frame, ready to be enqueued as a single write.
    pub fn finish(mut self) -> Result<Bytes, ProtoError> {
        if !self.prefixed {
            let mut framed = BytesMut::with_capacity(FRAME_LEN_PREFIX + self.buf.len());
            framed.put_bytes(0, FRAME_LEN_PREFIX);
            framed.extend_from_slice(&self.buf);
            self.buf = framed;
            self.prefixed = true;
        }

        let len = self.payload_len();
        if len == 0 {
            return Err(ProtoError::EmptyFrame);
        }
        if len > MAX_FRAME_PAYLOAD {
            return Err(ProtoError::FrameTooLarge(len));
        }
        self.buf[..FRAME_LEN_PREFIX].copy_from_slice(&(len as u32).to_le_bytes());
        Ok(self.buf.freeze())
    }
}
